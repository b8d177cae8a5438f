use std::fmt::Debug;

// Usable on any Result whose error can be printed, notably eyre reports.
// The pipeline never lets an error escape to the gateway, so these are the
// usual way a failed step turns into "this step did not happen".
pub trait ForwardRefToTracing<T, E> {
    fn trace_err(self) -> Result<T, E>;
    fn trace_err_ok(self) -> Option<T>;
    /// For failures that are expected in normal operation (missing
    /// permissions, vanished messages).
    fn trace_warn_ok(self, what: &str) -> Option<T>;
}

impl<T, E> ForwardRefToTracing<T, E> for Result<T, E>
where
    E: Debug,
{
    fn trace_err(self) -> Result<T, E> {
        self.inspect_err(|e| tracing::error!("{:?}", e))
    }

    fn trace_err_ok(self) -> Option<T> {
        self.trace_err().ok()
    }

    fn trace_warn_ok(self, what: &str) -> Option<T> {
        self.inspect_err(|e| tracing::warn!("{}: {:?}", what, e)).ok()
    }
}

#[cfg(test)]
mod test {
    use super::ForwardRefToTracing;

    #[test]
    fn ok_passes_through() {
        let result: Result<u8, &str> = Ok(3);
        assert_eq!(result.trace_err_ok(), Some(3));

        let result: Result<u8, &str> = Ok(4);
        assert_eq!(result.trace_warn_ok("four"), Some(4));
    }

    #[test]
    fn err_becomes_none() {
        let result: Result<u8, &str> = Err("nope");
        assert_eq!(result.trace_err_ok(), None);

        let result: Result<u8, &str> = Err("nope");
        assert_eq!(result.trace_err(), Err("nope"));

        let result: Result<u8, &str> = Err("missing permission");
        assert_eq!(result.trace_warn_ok("delete"), None);
    }
}
