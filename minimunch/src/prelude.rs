pub use crate::{
    app::App,
    config::*,
    data_structures::*,
    remote::{RemoteEvent, RemoteStore, RemoteWriteFailure, SharedStore, Subscription},
    util::*,
    view::*,
};
pub use anyhow::{anyhow, Context, Error, Result};
pub use std::sync::Arc;
pub use tokio::sync::watch;

pub type SharedMirror = Arc<watch::Sender<LocalStateMirror>>;
