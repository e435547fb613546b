pub struct Labels;

impl Labels {
    pub const DEFAULT_STATUS: &'static str = "Deactivated";
    pub const LOADING: &'static str = "Cargando...";
    pub const ACTION_PREFIX: &'static str = "Dispensador";
    pub const ACTIVATED: &'static str = "Activado";
    pub const DEACTIVATED: &'static str = "Desactivado";
}

pub struct Dispenser;

impl Dispenser {
    pub const MODEL: &'static str = "Minimunch";
    pub const MAX_CAPACITY_GRAMS: f64 = 5000.0;
    pub const RECORD_PATH: &'static str = "dispensador";
}
