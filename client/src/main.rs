//! Clinic session tool
//!
//! Inspects and manages the persisted clinic session from the command line:
//!
//! ```text
//! clinic-session [status]
//! clinic-session login <email> <password>
//! clinic-session select <clinic-id>
//! clinic-session clear-clinic
//! clinic-session logout
//! ```

use anyhow::{bail, Context};
use clinic_client::{ClinicApp, Config};
use shared::CurrentClinic;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinic_session=debug,clinic_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load().context("Failed to load configuration")?;

    tracing::info!("Environment: {}", config.environment);
    tracing::info!("Backend: {}", config.api.base_url);

    let app = ClinicApp::from_config(&config)?;
    app.restore().await;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        [] | ["status"] => {}
        ["login", email, password] => {
            if !app.login(email, password).await {
                bail!("Login failed for {}", email);
            }
            app.clinic().load_user_clinics().await;
        }
        ["select", clinic_id] => {
            if !app.switch_clinic(clinic_id).await {
                bail!(
                    "{}",
                    app.clinic()
                        .error()
                        .unwrap_or_else(|| "Failed to select clinic".to_string())
                );
            }
        }
        ["clear-clinic"] => {
            if !app.clear_clinic_selection().await {
                bail!("Failed to clear clinic selection");
            }
        }
        ["logout"] => app.logout(),
        other => bail!("Unknown command: {}", other.join(" ")),
    }

    report(&app).await;
    Ok(())
}

async fn report(app: &ClinicApp) {
    match app.health.check().await {
        Ok(health) => tracing::info!("Backend status: {}", health.status),
        Err(e) => tracing::warn!("Backend health check failed: {}", e),
    }

    let Some(user) = app.auth().user() else {
        tracing::info!("Not signed in");
        return;
    };
    tracing::info!("Signed in as {} <{}> ({})", user.full_name(), user.email, user.role);
    tracing::info!("Permissions: {}", user.permissions.join(", "));

    let clinic = app.clinic();
    match clinic.current_clinic() {
        CurrentClinic::Loaded(c) => {
            tracing::info!(
                "Clinic: {} ({}) as {}",
                c.name,
                c.id,
                clinic.clinic_role().unwrap_or_default()
            );
        }
        CurrentClinic::Degraded(c) => {
            tracing::warn!("Clinic {} selected, details unavailable", c.id);
        }
        CurrentClinic::Absent => {
            let clinics = clinic.user_clinics();
            tracing::info!("No clinic selected ({} available)", clinics.len());
            for membership in clinics {
                tracing::info!(
                    "  {} {} [{}]",
                    membership.clinic.id,
                    membership.clinic.name,
                    membership.role
                );
            }
        }
    }
    if let Some(error) = clinic.error() {
        tracing::warn!("{}", error);
    }
}
