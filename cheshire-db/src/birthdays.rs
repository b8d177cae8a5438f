use crate::{CheshireDb, ReadWriteTree};
use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};
use sled::Tree;

/// A day of the year. Orders by month, then day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct Birthday {
    pub month: u8,
    pub day: u8,
}

/// Birthdays per `(guild_id, user_id)`.
pub struct BirthdayDb(Tree);

impl BirthdayDb {
    pub fn new(db: &CheshireDb) -> Result<Self> {
        Ok(BirthdayDb(db.open_tree("birthdays")?))
    }

    /// Stores a birthday and returns the one it replaced.
    pub fn set(
        &self,
        guild_id: u64,
        user_id: u64,
        birthday: Birthday,
    ) -> Result<Option<Birthday>> {
        self.0.typed_insert(&(guild_id, user_id), &birthday)
    }

    pub fn get(&self, guild_id: u64, user_id: u64) -> Result<Option<Birthday>> {
        self.0.typed_get::<(u64, u64), Birthday>(&(guild_id, user_id))
    }

    /// Every `(user_id, birthday)` in the guild, in calendar order.
    pub fn in_guild(&self, guild_id: u64) -> Result<Vec<(u64, Birthday)>> {
        let mut birthdays = self
            .0
            .typed_scan_prefix::<u64, (u64, u64), Birthday>(&guild_id)?
            .into_iter()
            .map(|((_, user_id), birthday)| (user_id, birthday))
            .collect::<Vec<_>>();

        birthdays.sort_by_key(|&(user_id, birthday)| (birthday, user_id));

        Ok(birthdays)
    }

    /// Users in the guild whose birthday is `today`.
    pub fn on(&self, guild_id: u64, today: Birthday) -> Result<Vec<u64>> {
        Ok(self
            .in_guild(guild_id)?
            .into_iter()
            .filter(|&(_, birthday)| birthday == today)
            .map(|(user_id, _)| user_id)
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn day(day: u8, month: u8) -> Birthday {
        Birthday { month, day }
    }

    #[test]
    fn set_replaces() {
        let db = CheshireDb::temporary().unwrap();
        let birthdays = BirthdayDb::new(&db).unwrap();

        assert_eq!(birthdays.get(1, 10).unwrap(), None);
        assert_eq!(birthdays.set(1, 10, day(4, 7)).unwrap(), None);
        assert_eq!(birthdays.set(1, 10, day(5, 7)).unwrap(), Some(day(4, 7)));
        assert_eq!(birthdays.get(1, 10).unwrap(), Some(day(5, 7)));
    }

    #[test]
    fn guild_listing_is_in_calendar_order() {
        let db = CheshireDb::temporary().unwrap();
        let birthdays = BirthdayDb::new(&db).unwrap();

        birthdays.set(1, 10, day(25, 12)).unwrap();
        birthdays.set(1, 11, day(1, 1)).unwrap();
        birthdays.set(1, 12, day(30, 1)).unwrap();
        birthdays.set(2, 13, day(2, 1)).unwrap();

        assert_eq!(
            birthdays.in_guild(1).unwrap(),
            vec![(11, day(1, 1)), (12, day(30, 1)), (10, day(25, 12))]
        );
        assert_eq!(birthdays.in_guild(2).unwrap(), vec![(13, day(2, 1))]);
        assert!(birthdays.in_guild(3).unwrap().is_empty());
    }

    #[test]
    fn todays_guests() {
        let db = CheshireDb::temporary().unwrap();
        let birthdays = BirthdayDb::new(&db).unwrap();

        birthdays.set(1, 10, day(4, 5)).unwrap();
        birthdays.set(1, 11, day(4, 5)).unwrap();
        birthdays.set(1, 12, day(5, 4)).unwrap();
        birthdays.set(2, 13, day(4, 5)).unwrap();

        assert_eq!(birthdays.on(1, day(4, 5)).unwrap(), vec![10, 11]);
        assert!(birthdays.on(1, day(1, 1)).unwrap().is_empty());
    }
}
