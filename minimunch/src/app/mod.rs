pub use crate::prelude::*;
use crate::remote;

mod args;
mod console;

#[derive(Clone, Deref, Debug)]
pub struct App(Arc<AppServices>);

#[derive(Debug)]
pub struct AppServices {
    pub config: Arc<Configuration>,
    pub store:  SharedStore,
    pub view:   DeviceStatusView,
}

impl App {
    /// Parses the command line, sets up logging and mounts the view.
    /// Returns `None` when only a configuration file was generated.
    pub async fn new() -> Result<Option<Self>> {
        let opts = args::parse()?;
        simplelog::TermLogger::init(
            match opts.verbosity {
                0 => simplelog::LevelFilter::Info,
                1 => simplelog::LevelFilter::Debug,
                _ => simplelog::LevelFilter::Trace,
            },
            simplelog::ConfigBuilder::new()
                .add_filter_allow_str(crate_name!())
                .set_location_level(simplelog::LevelFilter::Debug)
                .set_target_level(simplelog::LevelFilter::Error)
                .set_time_format_str("%D %T")
                .set_time_to_local(true)
                .build(),
            simplelog::TerminalMode::Stderr,
        )?;
        if opts.generate {
            info!(
                "Generating new configuration file at {}",
                opts.config.to_string_lossy()
            );
            Configuration::generate_default(opts.config)?;
            return Ok(None);
        }
        info!("Starting {} {}", crate_name!(), crate_version!());
        let config = Configuration::load(opts.config)?;
        let store = remote::connect(&config.remote).await?;
        let view = DeviceStatusView::mount(store.clone(), &config.view).await?;
        Ok(Some(App(Arc::new(AppServices {
            config,
            store,
            view,
        }))))
    }

    pub async fn start(&self) -> Result<()> {
        debug!("Using {:?} for '{}'", self.store, self.config.view.path);
        let result = console::run(&self.view).await;
        self.view.unmount().await;
        result
    }
}
