use cheshire_lib::{
    birthday::announce_birthdays,
    commands, config,
    data::{AppState, State},
    event_handler::event_handler,
};
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use dotenvy::dotenv;
use poise::serenity_prelude as serenity;
use std::{sync::Arc, time::Duration};
use tracing_subscriber::util::SubscriberInitExt;

/// How often the spam tracker forgets users who went quiet.
const BURST_PRUNE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// The cli arguments for the bot
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Don't start the discord bot
    #[arg(short, long, default_value = "false")]
    pub dry_run: bool,

    /// Path to the config file
    #[arg(short, long, default_value_t = String::from("config.toml"))]
    pub config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .finish()
        .init();

    if let Err(e) = dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    let Args {
        dry_run,
        config: config_path,
    } = Args::parse();
    let token = std::env::var("DISCORD_TOKEN").wrap_err(
        "Expected a DISCORD_TOKEN environment variable. Set it or add `DISCORD_TOKEN=\"your token\"` to a .env file.",
    )?;
    let config =
        config::Config::create_from_file(&config_path).wrap_err("Failed to load config")?;

    tracing::info!(
        "Fixing links in {} channel(s)",
        config.linkfix.channel_ids.len()
    );

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(config.command_prefix.clone()),
                ..Default::default()
            },
            event_handler: |ctx, event, _framework, data| {
                Box::pin(event_handler(ctx, event, Arc::clone(data)))
            },
            on_error: |error| {
                async fn on_error(error: poise::FrameworkError<'_, State, color_eyre::eyre::Error>) {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            tracing::error!(
                                "Command {} failed: {:?}",
                                ctx.command().qualified_name,
                                error
                            );
                        }
                        other => {
                            if let Err(e) = poise::builtins::on_error(other).await {
                                tracing::error!("Failed to report framework error: {}", e);
                            }
                        }
                    }
                }

                Box::pin(on_error(error))
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_in_guild(
                    ctx,
                    &framework.options().commands,
                    serenity::GuildId::new(config.guild_id),
                )
                .await?;

                let data = Arc::new(AppState::new(config, config_path)?);

                {
                    let data = Arc::clone(&data);
                    tokio::spawn(async move {
                        let mut interval = tokio::time::interval(BURST_PRUNE_INTERVAL);
                        loop {
                            interval.tick().await;
                            data.bursts.prune(
                                serenity::Timestamp::now().unix_timestamp(),
                                BURST_PRUNE_INTERVAL.as_secs() as i64,
                            );
                        }
                    });
                }

                tokio::spawn(announce_birthdays(ctx.clone(), Arc::clone(&data)));

                Ok(data)
            })
        });

    let client = serenity::ClientBuilder::new(
        token,
        serenity::GatewayIntents::non_privileged()
            | serenity::GatewayIntents::MESSAGE_CONTENT
            | serenity::GatewayIntents::GUILD_MEMBERS
            | serenity::GatewayIntents::GUILD_MESSAGES
            | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS,
    )
    .framework(framework.build())
    .await;

    if dry_run {
        println!("Bot setup worked, dry run enabled, exiting");
        return Ok(());
    }

    tracing::info!("Starting bot");

    client
        .wrap_err("Failed to start bot (serenity)")?
        .start()
        .await
        .wrap_err("Failed to start bot (startup)")
}
