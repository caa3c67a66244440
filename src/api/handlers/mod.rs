pub mod health;
pub mod ledger;
pub mod sensors;

use crate::service::SensorService;

#[derive(Clone)]
pub struct AppState {
    pub sensors: SensorService,
}
