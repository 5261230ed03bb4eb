use lodestar_common::{DriverError, Locator, ProbeResult, WaitPolicy};
use lodestar_engine::driver::Driver;
use lodestar_engine::resolution::{ResolutionSource, ResolveOptions, Resolver, Strategy};
use lodestar_h::HeadlessDriver;
use serial_test::serial;
use std::time::Duration;

const LOGIN_PAGE: &str = "<html><head><title>Login</title></head><body>\
<label for='user'>Username</label><input id='user' placeholder='Enter username'>\
<button data-testid='login-button'>Sign In</button>\
<a href='/help'>Help</a>\
<div style='display:none' data-testid='ghost'>Hidden</div>\
</body></html>";

const SHORT: Duration = Duration::from_millis(500);

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::INFO)
        .try_init()
        .ok();
}

/// Launch a browser on the login page, or `None` when Chromium is unavailable.
async fn open_login_page() -> Option<HeadlessDriver> {
    init_tracing();
    let mut driver = HeadlessDriver::new();
    if let Err(e) = driver.launch().await {
        eprintln!("Failed to launch browser (is Chromium installed?): {}", e);
        return None;
    }
    let url = format!("data:text/html,{}", LOGIN_PAGE);
    let nav = driver
        .navigate(&url, WaitPolicy::Load, Duration::from_secs(30))
        .await
        .expect("Navigation failed");
    assert_eq!(nav.title, "Login");
    Some(driver)
}

#[tokio::test]
#[serial]
async fn test_probe_semantic_locators() {
    let Some(mut driver) = open_login_page().await else {
        return;
    };

    let by_id = driver
        .wait_for_visible(&Locator::test_id("login-button"), SHORT)
        .await
        .expect("probe failed");
    let handle = by_id.found().expect("test id should resolve");
    assert_eq!(handle.tag.as_deref(), Some("button"));
    assert_eq!(handle.match_count, 1);

    for locator in [
        Locator::text("Sign In"),
        Locator::role("link"),
        Locator::placeholder("Enter username"),
        Locator::label("Username"),
        Locator::css("input[placeholder]"),
        Locator::xpath("//button"),
    ] {
        let result = driver.wait_for_visible(&locator, SHORT).await.unwrap();
        assert!(result.found().is_some(), "{} should be visible", locator);
    }

    driver.close().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_hidden_element_is_not_found() {
    let Some(mut driver) = open_login_page().await else {
        return;
    };

    let result = driver
        .wait_for_visible(&Locator::test_id("ghost"), Duration::from_millis(300))
        .await
        .unwrap();
    assert_eq!(result, ProbeResult::NotFound);

    driver.close().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_invalid_selector_is_an_error() {
    let Some(mut driver) = open_login_page().await else {
        return;
    };

    let err = driver
        .wait_for_visible(&Locator::css("[[["), SHORT)
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::InvalidLocator { .. }), "got {:?}", err);

    driver.close().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_markup_and_screenshot() {
    let Some(mut driver) = open_login_page().await else {
        return;
    };

    let markup = driver.markup().await.unwrap();
    assert!(markup.contains("login-button"));

    let png = driver.screenshot().await.unwrap();
    assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));

    driver.close().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_resolver_over_headless_driver() {
    let Some(driver) = open_login_page().await else {
        return;
    };

    let mut resolver = Resolver::new(driver)
        .with_defaults(ResolveOptions::default().with_timeout(SHORT).without_ai());

    let first = resolver.resolve("Sign In").await.unwrap();
    assert_eq!(first.source, ResolutionSource::Strategy(Strategy::Text));

    let again = resolver.resolve("sign in").await.unwrap();
    assert_eq!(again.source, ResolutionSource::Cache);

    let button = resolver.resolve("login button").await.unwrap();
    assert_eq!(button.source, ResolutionSource::Strategy(Strategy::Role));
    assert_eq!(button.element.tag.as_deref(), Some("button"));

    let err = resolver.resolve("checkout total").await.unwrap_err();
    assert!(err.attempted().iter().any(|s| s == "by-test-id"));

    resolver.into_driver().close().await.unwrap();
}
