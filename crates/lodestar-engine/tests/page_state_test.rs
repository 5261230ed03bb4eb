use async_trait::async_trait;
use lodestar_common::{Locator, NavigationResult, ProbeResult, WaitPolicy};
use lodestar_engine::ai::{AiBackend, AiError, CompletionOptions, SuggestionAdapter};
use lodestar_engine::driver::{Driver, DriverError};
use lodestar_engine::{PageStateError, validate_page_state};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PNG: [u8; 4] = [0x89, b'P', b'N', b'G'];

/// Page that only knows how to take screenshots.
struct Screen {
    shots: usize,
    broken: bool,
}

#[async_trait]
impl Driver for Screen {
    async fn navigate(
        &mut self,
        url: &str,
        _wait: WaitPolicy,
        _timeout: Duration,
    ) -> Result<NavigationResult, DriverError> {
        Ok(NavigationResult {
            url: url.to_string(),
            title: "fake".to_string(),
            status: 200,
        })
    }

    async fn wait_for_visible(
        &mut self,
        _locator: &Locator,
        _timeout: Duration,
    ) -> Result<ProbeResult, DriverError> {
        Ok(ProbeResult::NotFound)
    }

    async fn markup(&mut self) -> Result<String, DriverError> {
        Ok(String::new())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.shots += 1;
        if self.broken {
            return Err(DriverError::Other("target closed".into()));
        }
        Ok(PNG.to_vec())
    }
}

/// Vision backend with a canned verdict; records the images it was shown.
struct FakeVision {
    reply: String,
    images: Mutex<Vec<Vec<u8>>>,
}

impl FakeVision {
    fn new(reply: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            images: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl AiBackend for FakeVision {
    fn provider(&self) -> &str {
        "fake-vision"
    }

    async fn complete(&self, _prompt: &str, _options: &CompletionOptions) -> Result<String, AiError> {
        Err(AiError::Unavailable("text completion not expected".into()))
    }

    fn supports_vision(&self) -> bool {
        true
    }

    async fn complete_with_image(
        &self,
        prompt: &str,
        image_png: &[u8],
        _options: &CompletionOptions,
    ) -> Result<String, AiError> {
        assert!(prompt.contains("dashboard"));
        self.images.lock().unwrap().push(image_png.to_vec());
        Ok(self.reply.clone())
    }
}

fn screen() -> Screen {
    Screen {
        shots: 0,
        broken: false,
    }
}

#[tokio::test]
async fn test_matching_page_returns_verdict() {
    let ai = FakeVision::new(serde_json::json!({
        "matches": true,
        "confidence": 0.92,
        "observations": ["welcome banner visible"],
    }));
    let adapter = SuggestionAdapter::new(ai.clone());
    let mut page = screen();

    let verdict = validate_page_state(&mut page, &adapter, "dashboard after login")
        .await
        .unwrap();

    assert!(verdict.matches);
    assert_eq!(verdict.observations, vec!["welcome banner visible"]);
    assert_eq!(page.shots, 1);
    assert_eq!(ai.images.lock().unwrap()[0], PNG.to_vec());
}

#[tokio::test]
async fn test_mismatch_is_error_listing_issues() {
    let ai = FakeVision::new(serde_json::json!({
        "matches": false,
        "confidence": 0.8,
        "issues": ["login form still shown", "no user menu"],
    }));
    let adapter = SuggestionAdapter::new(ai);
    let mut page = screen();

    let err = validate_page_state(&mut page, &adapter, "dashboard after login")
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Page state validation failed: login form still shown, no user menu"
    );
    match &err {
        PageStateError::Mismatch { expected, verdict } => {
            assert_eq!(expected, "dashboard after login");
            assert_eq!(verdict.issues.len(), 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.verdict().is_some());
}

#[tokio::test]
async fn test_screenshot_failure_skips_analysis() {
    let ai = FakeVision::new(serde_json::json!({ "matches": true }));
    let adapter = SuggestionAdapter::new(ai.clone());
    let mut page = Screen {
        shots: 0,
        broken: true,
    };

    let err = validate_page_state(&mut page, &adapter, "dashboard")
        .await
        .unwrap_err();

    assert!(matches!(err, PageStateError::Screenshot(DriverError::Other(_))));
    assert!(ai.images.lock().unwrap().is_empty());
}
