//! Integration tests for the archiving pipeline
//!
//! These tests use wiremock to serve product pages and gallery images and
//! read the resulting archive back with `zip::ZipArchive`.

use product_archiver::config::Config;
use product_archiver::crawler::{Extractor, Pipeline, SiteExtractor};
use product_archiver::output::RecordingProgress;
use product_archiver::ProductRecord;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a product page in the site's markup with the given gallery paths
fn product_page(name: &str, images: &[&str]) -> String {
    let slides: String = images
        .iter()
        .map(|src| format!(r#"<div class="swiper-slide"><img src="{}"></div>"#, src))
        .collect();

    format!(
        r#"<html><body>
<div class="product-variant-second product-variant-tab-first rs-zoom rs-product">
  <div><div><div><div><h1>{name}</h1></div></div></div></div>
</div>
<div class="product-rating__score">4.5</div>
<div class="product-gallery"><div><div class="swiper-wrapper">{slides}</div></div></div>
<div id="tab-description">Stainless steel, 1.7 l</div>
<div id="tab-property"><ul class="product-chars">
  <li><div><div>Power</div><div>2200 W</div></div></li>
</ul></div>
<span class="rs-price-new">1 990 ₽</span>
<div class="available_item">In stock</div>
</body></html>"#
    )
}

/// Creates a test configuration pointing at the mock site
fn create_test_config(server: &MockServer, archive: &Path) -> Config {
    let mut config = Config::default();
    config.scraper.page_concurrency = 2;
    config.scraper.image_concurrency = 2;
    config.http.timeout_secs = 5;
    config.http.connect_timeout_secs = 5;
    config.site.base_url = server.uri();
    config.output.archive_path = archive.to_string_lossy().to_string();
    config
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

async fn mount_image(server: &MockServer, route: &str, bytes: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(bytes.to_vec())
                .insert_header("content-type", "image/jpeg"),
        )
        .mount(server)
        .await;
}

fn entry_names(archive: &Path) -> Vec<String> {
    let file = std::fs::File::open(archive).expect("archive exists");
    let mut zip = zip::ZipArchive::new(file).expect("archive is a valid zip");
    let mut names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    names
}

fn read_entry(archive: &Path, name: &str) -> Vec<u8> {
    let file = std::fs::File::open(archive).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    let mut bytes = Vec::new();
    zip.by_name(name).unwrap().read_to_end(&mut bytes).unwrap();
    bytes
}

#[tokio::test]
async fn test_failed_page_is_reported_and_others_archived() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("products.zip");

    mount_page(&server, "/p/kettle", product_page("Kettle", &["/img/kettle.jpg"])).await;
    mount_page(&server, "/p/toaster", product_page("Toaster", &["/img/toaster.jpg"])).await;
    mount_image(&server, "/img/kettle.jpg", b"kettle-bytes").await;
    mount_image(&server, "/img/toaster.jpg", b"toaster-bytes").await;
    // /p/missing is not mounted and answers 404

    let config = create_test_config(&server, &archive);
    let urls = vec![
        format!("{}/p/kettle", server.uri()),
        format!("{}/p/missing", server.uri()),
        format!("{}/p/toaster", server.uri()),
    ];

    let report = Pipeline::from_config(&config)
        .unwrap()
        .run(&urls)
        .await
        .unwrap();

    assert_eq!(report.successes(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].url, urls[1]);
    assert_eq!(report.images_written(), 2);

    assert_eq!(
        entry_names(&archive),
        vec![
            "Kettle/data.json",
            "Kettle/gallery/kettle.jpg",
            "Toaster/data.json",
            "Toaster/gallery/toaster.jpg",
        ]
    );
    assert_eq!(
        read_entry(&archive, "Kettle/gallery/kettle.jpg"),
        b"kettle-bytes"
    );
}

#[tokio::test]
async fn test_no_urls_yields_empty_valid_archive() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("empty.zip");
    let config = create_test_config(&server, &archive);

    let report = Pipeline::from_config(&config)
        .unwrap()
        .run(&[])
        .await
        .unwrap();

    assert_eq!(report.url_count, 0);
    assert_eq!(report.archive.entries, 0);
    assert!(entry_names(&archive).is_empty());
}

#[tokio::test]
async fn test_failed_image_is_left_out() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("products.zip");

    mount_page(
        &server,
        "/p/kettle",
        product_page("Kettle", &["/img/1.jpg", "/img/2.jpg", "/img/3.jpg"]),
    )
    .await;
    mount_image(&server, "/img/1.jpg", b"one").await;
    Mock::given(method("GET"))
        .and(path("/img/2.jpg"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_image(&server, "/img/3.jpg", b"three").await;

    let config = create_test_config(&server, &archive);
    let progress = Arc::new(RecordingProgress::new());
    let report = Pipeline::from_config(&config)
        .unwrap()
        .with_progress(progress.clone())
        .run(&[format!("{}/p/kettle", server.uri())])
        .await
        .unwrap();

    assert_eq!(report.images_written(), 2);
    assert_eq!(report.images_failed(), 1);
    assert!(report.products[0].metadata_written);
    assert_eq!(
        entry_names(&archive),
        vec![
            "Kettle/data.json",
            "Kettle/gallery/1.jpg",
            "Kettle/gallery/3.jpg",
        ]
    );
}

#[tokio::test]
async fn test_colliding_names_get_distinct_directories() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("products.zip");

    mount_page(&server, "/p/1", product_page("A/B", &[])).await;
    mount_page(&server, "/p/2", product_page("A?B", &[])).await;

    let config = create_test_config(&server, &archive);
    let urls = vec![
        format!("{}/p/1", server.uri()),
        format!("{}/p/2", server.uri()),
    ];

    let report = Pipeline::from_config(&config)
        .unwrap()
        .run(&urls)
        .await
        .unwrap();

    assert_eq!(report.products[0].directory, "AB");
    assert_eq!(report.products[1].directory, "AB-2");
    assert_eq!(
        entry_names(&archive),
        vec!["AB-2/data.json", "AB/data.json"]
    );
}

#[tokio::test]
async fn test_archived_metadata_matches_extracted_record() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("products.zip");

    let page = product_page("Чайник электрический", &["/img/front.jpg"]);
    mount_page(&server, "/p/kettle", page.clone()).await;
    mount_image(&server, "/img/front.jpg", b"front").await;

    let config = create_test_config(&server, &archive);
    let url = format!("{}/p/kettle", server.uri());
    Pipeline::from_config(&config)
        .unwrap()
        .run(&[url.clone()])
        .await
        .unwrap();

    let extractor = SiteExtractor::new(url::Url::parse(&server.uri()).unwrap()).unwrap();
    let expected = extractor.extract(&url, page.as_bytes()).unwrap();

    let json = read_entry(&archive, "Чайник_электрический/data.json");
    let archived: ProductRecord = serde_json::from_slice(&json).unwrap();

    assert_eq!(archived, expected);
    assert_eq!(archived.rating, Some(4.5));
    assert_eq!(archived.gallery, vec![format!("{}/img/front.jpg", server.uri())]);
}

#[tokio::test]
async fn test_every_url_is_accounted_for() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("products.zip");

    mount_page(&server, "/p/kettle", product_page("Kettle", &[])).await;
    mount_page(&server, "/p/blank", "<html><body></body></html>".to_string()).await;

    let config = create_test_config(&server, &archive);
    let urls = vec![
        format!("{}/p/kettle", server.uri()),
        format!("{}/p/blank", server.uri()),
        format!("{}/p/gone", server.uri()),
        format!("{}/p/kettle", server.uri()),
    ];

    let report = Pipeline::from_config(&config)
        .unwrap()
        .run(&urls)
        .await
        .unwrap();

    assert_eq!(report.successes() + report.failures.len(), urls.len());
    assert_eq!(report.successes(), 2);
    assert_eq!(
        entry_names(&archive),
        vec!["Kettle-2/data.json", "Kettle/data.json"]
    );
}
