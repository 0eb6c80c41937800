use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use interview_live::realtime::SimulatedRealtimeClient;
use interview_live::{
    AudioCapturing, Config, JsonFileRepository, RealtimeAPIConnecting, RecoveryStateStore,
    SessionBackendFactory, SessionConfig, SessionError, SessionManager, SessionRecoveryService,
    SessionRepository, SimulatedCapture, Speaker, TranscriptionEvent,
};

#[derive(Parser)]
#[command(name = "interview-live", about = "Run a scripted live interview session")]
struct Args {
    /// Config file, without extension
    #[arg(long, default_value = "config/interview-live")]
    config: String,

    /// How long to let the scripted session run, in seconds
    #[arg(long, default_value_t = 5)]
    duration: u64,
}

/// Wires the simulated collaborators into the session manager.
struct SimulatedBackends {
    sample_rate: u32,
    channels: u16,
    script: Vec<TranscriptionEvent>,
}

impl SessionBackendFactory for SimulatedBackends {
    fn create_audio(&self) -> Result<Box<dyn AudioCapturing>, SessionError> {
        Ok(Box::new(SimulatedCapture::new(self.sample_rate, self.channels)))
    }

    fn create_realtime(&self) -> Result<Box<dyn RealtimeAPIConnecting>, SessionError> {
        let (client, _handle) =
            SimulatedRealtimeClient::scripted(self.script.clone(), Duration::from_millis(400));
        Ok(Box::new(client))
    }
}

fn demo_script() -> Vec<TranscriptionEvent> {
    let lines = [
        (Speaker::Interviewer, "Thanks for joining today."),
        (Speaker::Participant, "Happy to be here."),
        (
            Speaker::Participant,
            "I usually start my day by reviewing the dashboard.",
        ),
        (Speaker::Interviewer, "What do you look for first?"),
    ];

    let mut events = Vec::new();
    for (speaker, text) in lines {
        // One cumulative partial, then the finalizing event.
        let midpoint: String = text.chars().take(text.len() / 2).collect();
        events.push(TranscriptionEvent {
            text: midpoint,
            is_final: false,
            speaker: Some(speaker),
            confidence: None,
            timestamp: Utc::now(),
        });
        events.push(TranscriptionEvent {
            text: text.to_string(),
            is_final: true,
            speaker: Some(speaker),
            confidence: Some(0.95),
            timestamp: Utc::now(),
        });
    }
    events
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v0.1.0", cfg.service.name);

    let repository = Arc::new(JsonFileRepository::new(&cfg.storage.sessions_path)?);
    let recovery =
        SessionRecoveryService::new(RecoveryStateStore::new(&cfg.storage.recovery_state_path));
    let backends = Arc::new(SimulatedBackends {
        sample_rate: cfg.audio.sample_rate,
        channels: cfg.audio.channels,
        script: demo_script(),
    });

    let manager = SessionManager::new(
        backends,
        Arc::clone(&repository) as Arc<dyn SessionRepository>,
        recovery,
    );

    let session_config = SessionConfig {
        api_key: cfg.realtime.api_key.clone(),
        system_prompt: cfg.realtime.system_prompt.clone(),
        topics: vec!["daily workflow".to_string()],
        ..SessionConfig::default()
    };
    let session_id = session_config.session_id.clone();

    manager.configure(session_config).await?;

    let mut updates = manager
        .transcription_updates()
        .await
        .context("transcription stream unavailable")?;
    let printer = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            if update.is_final {
                println!("{:?}: {}", update.speaker, update.text);
            }
        }
    });

    manager.start().await?;
    info!(session_id = %session_id, "session running for {}s", args.duration);
    tokio::time::sleep(Duration::from_secs(args.duration)).await;

    manager.end().await?;
    printer.await?;

    let stats = manager.statistics().await;
    info!(
        "session ended after {}s: {} segments finalized, {} dropped",
        stats.elapsed_seconds, stats.buffer.finalized_segments, stats.buffer.dropped_partials
    );

    if let Some(record) = repository.get_session(&session_id).await? {
        info!("persisted {} utterances", record.utterances.len());
    }

    Ok(())
}
