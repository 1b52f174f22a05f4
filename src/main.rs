use dashbot::bot_guilds::CacheGuildSource;
use dashbot::discord::ReqwestTransport;
use dashbot::governor::DiscordGovernor;
use dashbot::web::{self, WebState};
use dashbot::{commands, config::Config, db::Database, events, Data};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    let discord_token = config.discord_token.clone();

    let db = Database::new(&config)?;
    db.execute_init()?;

    // One governor for the whole process: every user-token call shares its queue.
    let transport = ReqwestTransport::new(&config.discord_api_base, config.api_timeout())?;
    let bot_guilds = Arc::new(CacheGuildSource::new());
    let governor = Arc::new(DiscordGovernor::new(
        Arc::new(transport),
        bot_guilds.clone(),
        config.governor(),
    ));

    let data = Data {
        config: config.clone(),
        db: db.clone(),
        bot_guilds: bot_guilds.clone(),
    };

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            on_error: |error| Box::pin(commands::on_error(error)),
            event_handler: |ctx, event, _framework, data| {
                Box::pin(events::handle_event(ctx, event, data))
            },
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot is ready as {} in {} guilds", ready.user.name, ready.guilds.len());
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                data.bot_guilds.attach(ctx.cache.clone());

                // Set bot status
                ctx.set_activity(Some(serenity::ActivityData::custom(
                    data.config.status_message.clone(),
                )));

                Ok(data)
            })
        })
        .build();

    let intents =
        serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::GUILD_MEMBERS;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    let web_state = WebState::new(
        Arc::new(config.clone()),
        governor,
        db,
        client.http.clone(),
        bot_guilds,
    )?;
    let web_port = config.web_port;
    tokio::spawn(async move {
        if let Err(e) = web::serve(web_state, web_port).await {
            error!("Dashboard server stopped: {:#}", e);
        }
    });

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
