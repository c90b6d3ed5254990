mod app;
mod tui;

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use url::Url;

use snowfight::{
    HttpProvisioner, PlayerProfile, Provisioner, SantaColor, SessionConfig, StaticProvisioner,
};

#[derive(Parser)]
#[command(name = "snowfight")]
#[command(about = "Snowfight terminal client")]
struct Args {
    #[arg(short, long, help = "Room to join")]
    room: String,

    #[arg(short, long, default_value = "Santa")]
    nickname: String,

    #[arg(short, long, default_value = "red", help = "red, green, blue, yellow, purple or black")]
    skin: SantaColor,

    #[arg(long, default_value = "https://api.hathora.dev/")]
    provisioner_url: String,

    #[arg(long, help = "Application id used for the room lookup")]
    app_id: Option<String>,

    #[arg(long, help = "Skip the room lookup and connect to HOST:PORT (e.g., localhost:4000)")]
    local: Option<String>,

    #[arg(long, help = "Use ws:// instead of wss://")]
    insecure: bool,

    #[arg(long, default_value_t = 30)]
    fps: u32,

    #[arg(long, default_value = "snowfight.log")]
    log_file: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(Path::new(&args.log_file))?;

    let provisioner = provisioner_from(&args)?;
    let config = SessionConfig {
        secure: !(args.insecure || args.local.is_some()),
        ..Default::default()
    };
    let profile = PlayerProfile {
        nickname: args.nickname,
        skin: args.skin,
    };
    let frame_interval = Duration::from_secs_f64(1.0 / f64::from(args.fps.max(1)));

    log::info!("Joining room {} as {}", args.room, profile.nickname);
    let app = app::App::new(config, profile);
    app.run(provisioner.as_ref(), &args.room, frame_interval)
        .await
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn provisioner_from(args: &Args) -> Result<Box<dyn Provisioner>> {
    if let Some(local) = &args.local {
        let (host, port) = local
            .rsplit_once(':')
            .with_context(|| format!("expected HOST:PORT, got `{}`", local))?;
        let port: u16 = port
            .parse()
            .with_context(|| format!("invalid port in `{}`", local))?;
        return Ok(Box::new(StaticProvisioner::new(host, port)));
    }

    let Some(app_id) = &args.app_id else {
        bail!("--app-id is required unless --local is given");
    };
    let base_url = Url::parse(&args.provisioner_url)
        .with_context(|| format!("invalid provisioner url `{}`", args.provisioner_url))?;
    Ok(Box::new(HttpProvisioner::new(base_url, app_id.as_str())))
}
