#![allow(dead_code)]

use std::io::Write;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use elysian_engine::models::exercise::ExerciseContent;
use elysian_engine::models::ModuleKind;
use elysian_engine::services::capture_service::SimulatedCapture;
use elysian_engine::services::ExerciseService;
use elysian_engine::{Config, EngineError, EngineState};

#[tokio::main]
async fn main() {
    // Initialize OpenTelemetry tracer (optional, can be disabled)
    let _tracer = init_telemetry();

    // Initialize tracing with OpenTelemetry layer
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "elysian_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_opentelemetry::layer())
        .init();

    tracing::info!("Starting Elysian exercise engine console");

    // Load configuration
    let config = Config::load().expect("Failed to load configuration");
    tracing::info!("Using backend at {}", config.api_base_url);

    let module = match std::env::args().nth(1).as_deref().map(str::parse::<ModuleKind>) {
        Some(Ok(module)) => module,
        _ => {
            eprintln!("Usage: elysian-engine <speak|listen|read> [article-id]");
            std::process::exit(2);
        }
    };
    let content_id = std::env::args().nth(2);

    let state = EngineState::new(config).expect("Failed to initialize engine state");
    if !state.identity.is_authenticated() {
        eprintln!("No identity token found. Sign in and export ELYSIAN_ID_TOKEN first.");
        std::process::exit(1);
    }

    let service = open_session(&state, module);
    if let Err(e) = run(service, content_id.as_deref()).await {
        tracing::error!("Session ended with error: {:#}", e);
        std::process::exit(1);
    }

    shutdown_telemetry();
}

fn open_session(state: &EngineState, module: ModuleKind) -> ExerciseService {
    if module == ModuleKind::Speaking && !cfg!(feature = "microphone") {
        // No audio stack in default builds: script a tone per take so the
        // speaking flow stays usable end to end.
        let takes = (0..32)
            .map(|_| SimulatedCapture::tone_take(16_000, 1.5))
            .collect();
        return state
            .open_session_with_capture(module, Box::new(SimulatedCapture::with_script(16_000, takes)));
    }
    state.open_session(module)
}

async fn run(mut service: ExerciseService, content_id: Option<&str>) -> Result<()> {
    let mut next_content = content_id.map(str::to_string);
    'session: loop {
        load_with_retry(&mut service, next_content.take().as_deref()).await?;
        loop {
            present(&service);

            match service.module() {
                ModuleKind::Speaking => capture_response(&mut service)?,
                ModuleKind::Listening => {
                    play_and_wait(&mut service).await?;
                    answer_questions(&mut service)?;
                }
                ModuleKind::Reading => {
                    read_with_lookups(&mut service)?;
                    answer_questions(&mut service)?;
                }
            }

            submit_with_retry(&mut service).await?;
            show_result(&service);

            match prompt("[r]etry, [n]ext or [q]uit? ")?.as_str() {
                "r" => {
                    service.retry().map_err(anyhow::Error::from)?;
                }
                "n" => continue 'session,
                _ => {
                    service.abandon();
                    return Ok(());
                }
            }
        }
    }
}

async fn load_with_retry(service: &mut ExerciseService, content_id: Option<&str>) -> Result<()> {
    loop {
        match service.load(content_id).await {
            Ok(_) => return Ok(()),
            Err(EngineError::Fetch(e)) => {
                println!("Could not load the exercise: {}", e);
                if prompt("Try again? [y/N] ")? != "y" {
                    anyhow::bail!("exercise fetch abandoned");
                }
            }
            Err(e) => return Err(e).context("loading exercise"),
        }
    }
}

fn present(service: &ExerciseService) {
    let Some(exercise) = service.session().exercise() else {
        return;
    };
    println!();
    match exercise {
        ExerciseContent::Speaking(e) => {
            println!("== Speaking ({}, level {}) ==", e.kind.as_str(), e.cefr_level);
            println!("Say this out loud:\n  {}", e.content);
        }
        ExerciseContent::Listening(c) => {
            println!("== Listening: {} ==", c.title);
            println!("{}", c.description);
        }
        ExerciseContent::Reading(a) => {
            println!("== Reading: {} ==", a.title);
            println!("({} words, ~{} min)\n", a.word_count, a.estimated_reading_time);
            println!("{}", a.content);
        }
    }
}

fn capture_response(service: &mut ExerciseService) -> Result<()> {
    prompt("Press Enter to start recording... ")?;
    service.start_capture().map_err(anyhow::Error::from)?;
    prompt("Recording. Press Enter to stop... ")?;
    let artifact = service.stop_capture().map_err(anyhow::Error::from)?;
    println!(
        "Captured {:.1}s of audio.",
        artifact.duration_seconds()
    );
    Ok(())
}

async fn play_and_wait(service: &mut ExerciseService) -> Result<()> {
    if let Ok(speed) = prompt("Playback speed [1.0] ")?.parse::<f64>() {
        service.set_playback_speed(speed);
    }
    service.start_playback().map_err(anyhow::Error::from)?;
    println!("Playing...");
    while !service.sync_playback() {
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    }
    println!("Playback finished; the questions are unlocked.");
    Ok(())
}

fn read_with_lookups(service: &mut ExerciseService) -> Result<()> {
    println!("\nType a word to look it up, or press Enter when done reading.");
    loop {
        let line = prompt("> ")?;
        if line.is_empty() {
            return Ok(());
        }
        match service.lookup_word(&line) {
            Ok(Some(definition)) => println!("  {}: {}", line, definition),
            Ok(None) => println!("  No definition available."),
            Err(e) => println!("  {}", e),
        }
    }
}

fn answer_questions(service: &mut ExerciseService) -> Result<()> {
    let questions: Vec<_> = service
        .session()
        .exercise()
        .map(|exercise| exercise.questions().to_vec())
        .unwrap_or_default();
    for (index, question) in questions.iter().enumerate() {
        println!("\nQ{}: {}", index + 1, question.question);
        if let Some(options) = &question.options {
            for option in options {
                println!("  - {}", option);
            }
        }
        loop {
            let answer = prompt("Your answer: ")?;
            match service.record_answer(index, answer) {
                Ok(()) => break,
                Err(e) => println!("  {}", e),
            }
        }
    }
    Ok(())
}

async fn submit_with_retry(service: &mut ExerciseService) -> Result<()> {
    loop {
        match service.submit().await {
            Ok(_) => return Ok(()),
            Err(EngineError::Submission(e)) => {
                // The attempt is preserved; resubmitting sends it as-is.
                println!("Submission failed: {}", e);
                if prompt("Retry submission? [y/N] ")? != "y" {
                    anyhow::bail!("submission abandoned");
                }
            }
            Err(EngineError::IncompleteAttempt { missing }) => {
                anyhow::bail!("{} answer(s) still missing", missing);
            }
            Err(e) => return Err(e).context("submitting attempt"),
        }
    }
}

fn show_result(service: &ExerciseService) {
    let Some(result) = service.session().result() else {
        return;
    };
    println!("\nScore: {:.0}", result.score);
    for review in &result.detailed_results {
        let mark = if review.is_correct { "+" } else { "x" };
        println!("  [{}] {} (you said: {})", mark, review.question, review.user_answer);
    }
    if let Some(analysis) = &result.analysis {
        if let Some(intonation) = analysis.intonation_score {
            println!("Pronunciation {:.0}, intonation {:.0}", analysis.pronunciation_score, intonation);
        }
    }
    println!("{}", result.feedback);
    println!("+{} XP{}", result.xp_earned, if result.level_up { " - level up!" } else { "" });
}

fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn init_telemetry() -> opentelemetry_sdk::trace::Tracer {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::SdkTracerProvider;
    use opentelemetry_sdk::Resource;

    // Check if OTLP endpoint is configured
    let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4318".to_string());

    // Configure OTLP exporter
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(otlp_endpoint)
        .build()
        .expect("Failed to create OTLP exporter");

    // Create resource with service information
    let resource = Resource::builder_empty()
        .with_service_name("elysian-engine")
        .with_attributes(vec![KeyValue::new(
            "service.version",
            env!("CARGO_PKG_VERSION"),
        )])
        .build();

    // Create tracer provider
    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    let tracer = provider.tracer("elysian-engine");

    // Set global tracer provider
    opentelemetry::global::set_tracer_provider(provider);

    tracer
}

fn shutdown_telemetry() {
    tracing::info!("Shutting down OpenTelemetry");
    // In opentelemetry 0.31, shutdown is handled by dropping the provider
}
