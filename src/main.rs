use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use jukebox::{
    audio::{SessionRegistry, TrackSelector},
    bot::JukeboxHandler,
    config::Config,
    lyrics::HttpLyricsClient,
    node::SongbirdNode,
    ui::ReactionPrompt,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Jukebox v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    // Intents mínimos: voz, reacciones de selección y caché de guilds
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS;

    // Nodo de audio sobre songbird
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let songbird = Songbird::serenity();
    let node = Arc::new(SongbirdNode::new(
        songbird.clone(),
        reqwest::Client::new(),
        events_tx.clone(),
        config.search_results,
    ));

    // Núcleo de reproducción
    let prompt = Arc::new(ReactionPrompt::new(Arc::new(Http::new(&config.discord_token))));
    let selector = Arc::new(TrackSelector::new(prompt, config.selection_timeout()));
    let lyrics = Arc::new(HttpLyricsClient::new(config.lyrics_url.clone())?);
    let registry = Arc::new(SessionRegistry::new(node, selector, lyrics));
    let event_loop = registry.clone().spawn_event_loop(events_rx);

    // Construir cliente
    let handler = JukeboxHandler::new(registry.clone(), events_tx);
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Iniciar bot hasta Ctrl+C
    info!("🚀 Bot iniciado exitosamente");
    tokio::select! {
        result = client.start() => {
            if let Err(why) = result {
                error!("Error al ejecutar cliente: {:?}", why);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("⚠️ Señal de shutdown recibida, cerrando...");
        }
    }

    registry.shutdown().await;
    client.shard_manager.shutdown_all().await;
    event_loop.abort();

    Ok(())
}
