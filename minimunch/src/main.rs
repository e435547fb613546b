use minimunch::{App, Result};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    match App::new().await? {
        Some(app) => app.start().await,
        None => Ok(()),
    }
}
