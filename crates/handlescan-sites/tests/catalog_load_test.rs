use handlescan_sites::{
    DetectionRule, HttpCatalog, LoadPolicy, RegistryError, SiteRegistry, StaticCatalog,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CATALOG: &str = r#"{
    "$schema": "data.schema.json",
    "GitHub": {
        "urlMain": "https://www.github.com/",
        "url": "https://www.github.com/{}",
        "username_claimed": "blue",
        "errorType": "status_code"
    },
    "Pornhub": {
        "urlMain": "https://pornhub.com/",
        "url": "https://pornhub.com/users/{}",
        "username_claimed": "asian",
        "errorType": "message",
        "errorMsg": "Error Page Not Found",
        "isNSFW": true
    },
    "Broken": {
        "urlMain": "https://broken.test/",
        "username_claimed": "x",
        "errorType": "status_code"
    }
}"#;

#[tokio::test]
async fn test_load_local_catalog() {
    let dir = TempDir::new().expect("create temp dir");
    let file = dir.path().join("sites.json");
    std::fs::write(&file, CATALOG).expect("write catalog");

    let registry = SiteRegistry::load(file.to_str().expect("utf-8 path"), LoadPolicy::Lenient)
        .await
        .expect("load catalog");

    assert_eq!(registry.site_name_list(), vec!["GitHub", "Pornhub"]);
    assert_eq!(registry.schema(), Some("data.schema.json"));
    assert_eq!(registry.skipped().len(), 1);
    assert_eq!(registry.skipped()[0].site, "Broken");
    assert_eq!(registry.skipped()[0].field, "url");
    assert_eq!(registry.without_nsfw().site_name_list(), vec!["GitHub"]);
}

#[tokio::test]
async fn test_wrong_extension_produces_no_registry() {
    let dir = TempDir::new().expect("create temp dir");
    let file = dir.path().join("sites.yaml");
    std::fs::write(&file, CATALOG).expect("write catalog");

    let err = SiteRegistry::load(file.to_str().expect("utf-8 path"), LoadPolicy::Lenient)
        .await
        .expect_err("wrong extension");
    assert!(matches!(err, RegistryError::WrongExtension { .. }));
}

#[tokio::test]
async fn test_missing_local_file() {
    let dir = TempDir::new().expect("create temp dir");
    let file = dir.path().join("absent.json");

    let err = SiteRegistry::load(file.to_str().expect("utf-8 path"), LoadPolicy::Lenient)
        .await
        .expect_err("missing file");
    assert!(matches!(err, RegistryError::NotFound { .. }));
}

#[tokio::test]
async fn test_load_remote_catalog() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources/data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CATALOG))
        .mount(&server)
        .await;

    let url = format!("{}/resources/data.json", server.uri());
    let registry = SiteRegistry::load(&url, LoadPolicy::Lenient)
        .await
        .expect("load remote catalog");

    assert_eq!(registry.len(), 2);
    let site = registry.get("Pornhub").expect("site present");
    assert_eq!(
        site.detection_rule,
        DetectionRule::Message {
            error_messages: vec!["Error Page Not Found".to_string()]
        }
    );
}

#[tokio::test]
async fn test_remote_non_200_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let provider =
        HttpCatalog::new(format!("{}/data.json", server.uri())).expect("create provider");
    let err = SiteRegistry::load_from(&provider, LoadPolicy::Lenient)
        .await
        .expect_err("bad status");

    assert!(matches!(err, RegistryError::BadStatus { status: 503, .. }));
}

#[tokio::test]
async fn test_remote_unreachable_fails() {
    let err = SiteRegistry::load("http://127.0.0.1:1/data.json", LoadPolicy::Lenient)
        .await
        .expect_err("nothing listens on port 1");
    assert!(matches!(err, RegistryError::Unreachable { .. }));
}

#[tokio::test]
async fn test_malformed_remote_body_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = SiteRegistry::load(&format!("{}/data.json", server.uri()), LoadPolicy::Lenient)
        .await
        .expect_err("malformed body");
    assert!(matches!(err, RegistryError::Malformed { .. }));
}

#[tokio::test]
async fn test_strict_policy_through_provider() {
    let provider = StaticCatalog::new("pinned-v1", CATALOG);

    let err = SiteRegistry::load_from(&provider, LoadPolicy::Strict)
        .await
        .expect_err("strict load rejects Broken");
    assert!(matches!(err, RegistryError::Validation(ref e) if e.site == "Broken"));
}
