// src/bridge.rs
//
// Process-wide context: settings, the base station link and the question
// session, wired together once at startup and shared with the HTTP layer.

use std::sync::Arc;

use crate::io::link::{LinkManager, LinkStatus, ReaderTask};
use crate::io::serial::Connector;
use crate::question::QuestionSession;
use crate::settings::AppSettings;

pub struct Bridge {
    settings: AppSettings,
    link: Arc<LinkManager>,
    session: Arc<QuestionSession>,
}

impl Bridge {
    pub fn new(settings: AppSettings, connector: Arc<dyn Connector>) -> Self {
        let link = Arc::new(LinkManager::new(connector, &settings));
        let session = Arc::new(QuestionSession::new(settings.device_count, link.clone()));

        Self {
            settings,
            link,
            session,
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn link(&self) -> &Arc<LinkManager> {
        &self.link
    }

    pub fn session(&self) -> &Arc<QuestionSession> {
        &self.session
    }

    pub fn link_status(&self) -> LinkStatus {
        self.link.status()
    }

    /// Feed decoded votes from the link into the session. Requires a tokio runtime.
    pub fn start_reader(&self) -> ReaderTask {
        self.link.spawn_reader(self.session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::link::LinkState;
    use crate::testing::{test_settings, wait_until, MockConnector, MockDevice};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_bridge_routes_votes_into_session() {
        let device = MockDevice::new();
        let connector = Arc::new(MockConnector::new(vec![device.clone()]));
        let bridge = Bridge::new(test_settings(), connector);

        bridge.link().connect().unwrap();
        bridge.session().start("two").unwrap();
        device.push_data(b"{\"buttonPressed\": 1, \"address\": 3}>\n");

        let reader = bridge.start_reader();
        assert!(wait_until(Duration::from_secs(2), || bridge.session().snapshot().answered == 1));
        reader.stop().await;

        assert_eq!(bridge.link_status().state, LinkState::Connected);
        assert_eq!(bridge.settings().device_count, 10);
        assert!(device.written_string().ends_with("AN 03 01>"));
    }
}
