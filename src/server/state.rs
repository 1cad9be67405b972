use crate::ocr::SharedOcr;
use crate::session::SessionStore;
use crate::settings::Settings;

pub struct ServerState {
    pub(crate) settings: Settings,
    pub(crate) sessions: SessionStore,
    pub(crate) ocr: SharedOcr,
}

impl ServerState {
    pub fn new(settings: Settings, ocr: SharedOcr) -> Self {
        Self {
            settings,
            sessions: SessionStore::default(),
            ocr,
        }
    }
}
