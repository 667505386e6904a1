use anyhow::{Context, Result};
use clap::Parser;
use slide_image_placer::app::{App, PlacementJob};
use slide_image_placer::auth::AuthorizationContext;
use slide_image_placer::models::{Config, ImageReference, PlacementTransform};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "slide-image-placer")]
#[command(about = "Upload a local image and place it on a Google Slides page")]
struct CliArgs {
    /// Image to place; its file stem becomes the object key and element id.
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Object id of the target slide.
    #[arg(long)]
    page: String,

    /// Horizontal scale applied to the 4,000,000 EMU square image.
    #[arg(long, default_value_t = 1.8, allow_hyphen_values = true)]
    scale_x: f64,

    /// Vertical scale applied to the 4,000,000 EMU square image.
    #[arg(long, default_value_t = 1.8, allow_hyphen_values = true)]
    scale_y: f64,

    /// Horizontal offset in EMU (914,400 per inch).
    #[arg(long, default_value_t = 1_100_000.0, allow_hyphen_values = true)]
    translate_x: f64,

    /// Vertical offset in EMU (914,400 per inch).
    #[arg(long, default_value_t = -500_000.0, allow_hyphen_values = true)]
    translate_y: f64,

    /// Presentation id (overrides SLIDES_PRESENTATION_ID).
    #[arg(long)]
    presentation: Option<String>,

    /// Bucket name (overrides STORAGE_BUCKET).
    #[arg(long)]
    bucket: Option<String>,
}

impl CliArgs {
    fn job(&self) -> slide_image_placer::Result<PlacementJob> {
        Ok(PlacementJob {
            image: ImageReference::from_path(&self.image)?,
            page_id: self.page.clone(),
            transform: PlacementTransform::new(
                self.scale_x,
                self.scale_y,
                self.translate_x,
                self.translate_y,
            )?,
        })
    }
}

fn load_auth(
    config: &Config,
    http_client: reqwest::Client,
) -> slide_image_placer::Result<AuthorizationContext> {
    let auth = match (&config.credentials_path, &config.access_token) {
        (Some(path), _) => AuthorizationContext::from_key_file(path, config.scopes.clone())?,
        (None, Some(token)) => {
            AuthorizationContext::from_access_token(token.clone(), config.scopes.clone())
        }
        (None, None) => {
            return Err(slide_image_placer::Error::Config(
                "No credentials configured".to_string(),
            ))
        }
    };
    Ok(auth.with_http_client(http_client))
}

fn exposure_message(accessible_for: Duration) -> String {
    format!(
        "Image was accessible for {:.4} second(s).",
        accessible_for.as_secs_f64()
    )
}

async fn run(args: CliArgs) -> Result<()> {
    let mut config = Config::from_env().context("loading configuration")?;
    if args.presentation.is_some() {
        config.presentation_id = args.presentation.clone();
    }
    if args.bucket.is_some() {
        config.bucket = args.bucket.clone();
    }

    let job = args.job()?;
    // One connection pool for token exchanges, storage and Slides.
    let http_client = reqwest::Client::new();
    let auth = load_auth(&config, http_client.clone()).context("loading credentials")?;
    let app = App::new(&config, http_client).await?;

    info!(
        "Placing {} on page {} of presentation {}",
        job.image.path().display(),
        job.page_id,
        app.presentation_id()
    );
    let report = app.run(&auth, &job).await?;

    if report.replaced_existing {
        info!("Replaced existing element {}", report.element_id);
    }
    info!("{}", exposure_message(report.accessible_for));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slide_image_placer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    match run(args).await {
        Ok(()) => {
            info!("Placement completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Placement failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_match_original_layout() {
        let args = CliArgs::try_parse_from(["slide-image-placer", "figs/cat.png", "--page", "p1"])
            .unwrap();
        let job = args.job().unwrap();

        assert_eq!(job.image.file_name(), "cat");
        assert_eq!(job.page_id, "p1");
        assert_eq!(job.transform, PlacementTransform::default());
    }

    #[test]
    fn test_cli_accepts_negative_offsets() {
        let args = CliArgs::try_parse_from([
            "slide-image-placer",
            "cat.png",
            "--page",
            "p1",
            "--translate-x",
            "-914400",
            "--scale-x",
            "1",
        ])
        .unwrap();
        let job = args.job().unwrap();

        assert_eq!(job.transform.translate_x(), -914_400.0);
        assert_eq!(job.transform.scale_x(), 1.0);
    }

    #[test]
    fn test_cli_rejects_zero_scale() {
        let args = CliArgs::try_parse_from([
            "slide-image-placer",
            "cat.png",
            "--page",
            "p1",
            "--scale-y",
            "0",
        ])
        .unwrap();
        assert!(args.job().is_err());
    }

    #[test]
    fn test_exposure_message_has_four_decimals() {
        assert_eq!(
            exposure_message(Duration::from_millis(1234)),
            "Image was accessible for 1.2340 second(s)."
        );
        assert_eq!(
            exposure_message(Duration::from_micros(75)),
            "Image was accessible for 0.0001 second(s)."
        );
        assert_eq!(
            exposure_message(Duration::ZERO),
            "Image was accessible for 0.0000 second(s)."
        );
    }

    #[test]
    fn test_cli_requires_page() {
        assert!(CliArgs::try_parse_from(["slide-image-placer", "cat.png"]).is_err());
    }
}
