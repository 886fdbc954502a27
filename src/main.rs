use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use enroll_wizard::config::WizardConfig;
use enroll_wizard::validate::DocumentKind;
use enroll_wizard::wizard::{
    Progress, Step, StepController, StepDraft, SubmitOutcome, WizardSession,
};
use tracing::info;

/// Answer keys on the upload step that name files rather than fields.
const PHOTO_PATH: &str = "photoPath";
const SIGNATURE_PATH: &str = "signaturePath";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let answers_path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| {
        eprintln!("Usage: enroll-wizard <answers.json>");
        std::process::exit(2);
    });
    let answers = load_answers(&answers_path).await?;
    let base_dir = answers_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let config = WizardConfig::from_env().context("Invalid ENROLL_* configuration")?;

    eprintln!("Enroll Wizard v{}", env!("CARGO_PKG_VERSION"));
    if config.dry_run {
        eprintln!("   Backend: in-process (dry run)");
    } else {
        eprintln!("   Backend: {}", config.api_base_url);
    }
    eprintln!("   Drafts: {}", config.draft_dir.display());

    let mut session = WizardSession::from_config(&config)?;
    if let Some(id) = session.resume().await {
        eprintln!("   Resuming registration {id}");
    }

    loop {
        let step = session.current_step();
        println!("{} ({})", session.sequencer().progress(), step.title());

        let mut controller = session.open_step().await?;
        let section = answers.get(step.storage_key()).cloned().unwrap_or_default();
        apply_answers(&mut controller, &section, &base_dir)
            .await
            .with_context(|| format!("Failed to apply answers for {step}"))?;

        let outcome = controller.submit().await?;
        match session.record(&outcome).await? {
            Progress::Moved(next) => {
                info!(step = %step, next = %next, "Step saved");
            }
            Progress::Completed => {
                println!("Registration complete.");
                return Ok(ExitCode::SUCCESS);
            }
            Progress::Stayed => {
                report(&controller, &outcome);
                return Ok(ExitCode::from(1));
            }
        }
    }
}

/// Answers file: one object per step, keyed by the step's storage key.
async fn load_answers(path: &Path) -> anyhow::Result<serde_json::Map<String, serde_json::Value>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => bail!("{} must contain a JSON object", path.display()),
    }
}

async fn apply_answers(
    controller: &mut StepController,
    section: &serde_json::Value,
    base_dir: &Path,
) -> anyhow::Result<()> {
    let Some(mut draft) = StepDraft::from_json_value(section) else {
        return Ok(());
    };

    if controller.step() == Step::UploadDocuments {
        for (key, kind) in [(PHOTO_PATH, DocumentKind::Photo), (SIGNATURE_PATH, DocumentKind::Signature)] {
            if let Some(path) = draft.remove(key) {
                attach_file(controller, kind, &base_dir.join(path)).await?;
            }
        }
    }

    for (field, value) in draft.iter() {
        controller.edit_and_check(field, value).await?;
    }
    Ok(())
}

async fn attach_file(
    controller: &mut StepController,
    kind: DocumentKind,
    path: &Path,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") => {
            "image/jpeg"
        }
        Some(ext) if ext.eq_ignore_ascii_case("png") => "image/png",
        _ => "application/octet-stream",
    };
    if !controller.attach_document(kind, content_type, &bytes)? {
        let reason = controller.errors().get(kind.error_key()).unwrap_or("rejected");
        bail!("{} {}: {reason}", kind.label(), path.display());
    }
    Ok(())
}

fn report(controller: &StepController, outcome: &SubmitOutcome) {
    let step = controller.step();
    match outcome {
        SubmitOutcome::Invalid(_) => eprintln!("{step}: please correct the following"),
        SubmitOutcome::Duplicate(_) => eprintln!("{step}: already registered"),
        SubmitOutcome::Rejected(_) => eprintln!("{step}: not saved"),
        SubmitOutcome::Advanced { .. } => {}
    }
    for (field, message) in controller.errors().iter() {
        eprintln!("   {field}: {message}");
    }
    if let Some(alert) = controller.alert() {
        eprintln!("   {alert}");
    }
    eprintln!("Drafts are kept; fix the answers and run again.");
}
