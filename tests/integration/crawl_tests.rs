//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock recipe sites and test
//! the full crawl cycle end-to-end over real HTTP.

use recipe_harvest::config::{parse_config, CrawlerConfig, UserAgentConfig};
use recipe_harvest::crawler::{crawl, crawl_sites};
use recipe_harvest::extract::RecipeExtractor;
use recipe_harvest::model::Recipe;
use recipe_harvest::output::{export_json, load_statistics};
use recipe_harvest::site::{LinkSelector, PageScheme, SiteAdapter, Traversal};
use recipe_harvest::storage::{
    MemorySink, RecipeSink, RunStatus, SqliteRecipeStore, StorageError, StorageResult,
};
use recipe_harvest::HarvestError;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_crawler_config(download_images: bool) -> CrawlerConfig {
    CrawlerConfig {
        min_delay_ms: 0,
        max_delay_ms: 0,
        max_retries: 0,
        timeout_secs: 5,
        max_concurrent_sites: 2,
        download_images,
    }
}

fn test_user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn listing(slugs: &[&str]) -> String {
    let posts: String = slugs
        .iter()
        .map(|slug| {
            format!(
                r#"<div class="post"><a href="/{}/"><img src="/thumb.jpg"></a><a href="/other">more</a></div>"#,
                slug
            )
        })
        .collect();
    format!("<html><body><div class=\"sidebar\"><a href=\"/about\">About</a></div>{}</body></html>", posts)
}

fn recipe_page(name: &str) -> String {
    format!(
        r#"<html><head><meta property="og:site_name" content="Test Kitchen"></head>
        <body><div itemscope itemtype="http://schema.org/Recipe">
            <h1 itemprop="name">{}</h1>
            <span itemprop="author">Jane Cook</span>
            <img itemprop="image" src="/img/{}.jpg">
            <span itemprop="recipeYield">4 servings</span>
            <time itemprop="prepTime" datetime="PT15M">15 minutes</time>
            <time itemprop="cookTime" datetime="PT1H">1 hour</time>
            <ul>
                <li itemprop="ingredients">2 cups flour</li>
                <li itemprop="ingredients">1 egg</li>
            </ul>
        </div></body></html>"#,
        name, name
    )
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn mount_recipes(server: &MockServer, slugs: &[&str]) {
    for slug in slugs {
        mount_page(server, &format!("/{}/", slug), recipe_page(slug)).await;
    }
}

fn paginated_site(server: &MockServer) -> SiteAdapter {
    let base = server.uri();
    SiteAdapter::new(
        "test-kitchen",
        &base,
        &format!("{}/recipes", base),
        LinkSelector::with_class("div", "post"),
    )
    .unwrap()
}

#[tokio::test]
async fn test_full_crawl_paginated_site() {
    let server = MockServer::start().await;

    mount_page(&server, "/recipes/page/1", listing(&["soup", "stew", "notes"])).await;
    mount_page(&server, "/recipes/page/2", listing(&["bread", "gone"])).await;
    mount_recipes(&server, &["soup", "stew", "bread"]).await;
    mount_page(
        &server,
        "/notes/",
        "<html><body><p>Kitchen notes, no recipe here</p></body></html>".to_string(),
    )
    .await;
    // /gone/ and /recipes/page/3 are unmounted and answer 404

    let store = Arc::new(SqliteRecipeStore::new_in_memory().unwrap());
    let reports = crawl_sites(
        &test_crawler_config(false),
        &test_user_agent(),
        RecipeExtractor::default(),
        vec![paginated_site(&server)],
        Arc::clone(&store),
    )
    .await
    .unwrap();

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.site, "test-kitchen");
    assert_eq!(report.stored, 3);
    assert_eq!(report.no_recipe, 1);
    assert_eq!(report.not_found, 1);
    assert_eq!(report.listing_pages, 2);
    assert_eq!(store.count().unwrap(), 3);

    let soup_url = format!("{}/soup/", server.uri());
    let soup = store.get_recipe(&soup_url).unwrap().unwrap();
    assert_eq!(soup.name, "soup");
    assert_eq!(soup.author.as_deref(), Some("Jane Cook"));
    assert_eq!(soup.recipe_yield.as_deref(), Some("4 servings"));
    assert_eq!(soup.prep_time.as_ref().unwrap().minutes(), 15);
    assert_eq!(soup.cook_time.as_ref().unwrap().minutes(), 60);
    assert_eq!(soup.ingredients, vec!["2 cups flour", "1 egg"]);
    assert!(soup.image_data.is_none());
}

#[tokio::test]
async fn test_second_crawl_skips_stored_recipes() {
    let server = MockServer::start().await;

    mount_page(&server, "/recipes/page/1", listing(&["soup", "stew"])).await;
    mount_recipes(&server, &["soup", "stew"]).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("recipes.db");

    let store = Arc::new(SqliteRecipeStore::new(&db_path).unwrap());
    let first = crawl_sites(
        &test_crawler_config(false),
        &test_user_agent(),
        RecipeExtractor::default(),
        vec![paginated_site(&server)],
        Arc::clone(&store),
    )
    .await
    .unwrap();
    assert_eq!(first[0].stored, 2);
    drop(store);

    let store = Arc::new(SqliteRecipeStore::new(&db_path).unwrap());
    let second = crawl_sites(
        &test_crawler_config(false),
        &test_user_agent(),
        RecipeExtractor::default(),
        vec![paginated_site(&server)],
        Arc::clone(&store),
    )
    .await
    .unwrap();

    assert_eq!(second[0].stored, 0);
    assert_eq!(second[0].already_stored, 2);
    assert_eq!(store.count().unwrap(), 2);

    // Stored recipes are never fetched again: one GET per recipe across both runs
    let requests = server.received_requests().await.unwrap();
    let soup_fetches = requests
        .iter()
        .filter(|request| request.url.path() == "/soup/")
        .count();
    assert_eq!(soup_fetches, 1);
}

#[tokio::test]
async fn test_category_site_with_query_pagination() {
    let server = MockServer::start().await;
    let base = server.uri();

    let index = format!(
        r#"<html><body><ul>
            <li class="cat-item"><a href="{}/category/soups">Soups</a></li>
            <li class="cat-item"><a href="/category/breads">Breads</a></li>
        </ul></body></html>"#,
        base
    );
    mount_page(&server, "/recipes", index).await;

    Mock::given(method("GET"))
        .and(path("/category/soups"))
        .and(query_param("pg", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing(&["soup", "stew"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/category/soups"))
        .and(query_param("pg", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing(&[])))
        .mount(&server)
        .await;
    // soup shows up in both categories and is only fetched once
    Mock::given(method("GET"))
        .and(path("/category/breads"))
        .and(query_param("pg", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing(&["bread", "soup"])))
        .mount(&server)
        .await;
    mount_recipes(&server, &["soup", "stew", "bread"]).await;

    let site = SiteAdapter::new(
        "categories",
        &base,
        &format!("{}/recipes", base),
        LinkSelector::with_class("div", "post"),
    )
    .unwrap()
    .with_traversal(Traversal::CategoryPaginated)
    .with_pagination(PageScheme::Query {
        param: "pg".to_string(),
    })
    .with_categories(LinkSelector::with_class("li", "cat-item"))
    .unwrap();

    let store = Arc::new(SqliteRecipeStore::new_in_memory().unwrap());
    let reports = crawl_sites(
        &test_crawler_config(false),
        &test_user_agent(),
        RecipeExtractor::default(),
        vec![site],
        Arc::clone(&store),
    )
    .await
    .unwrap();

    assert_eq!(reports[0].stored, 3);
    assert_eq!(store.count().unwrap(), 3);

    let requests = server.received_requests().await.unwrap();
    let soup_fetches = requests
        .iter()
        .filter(|request| request.url.path() == "/soup/")
        .count();
    assert_eq!(soup_fetches, 1);
}

#[tokio::test]
async fn test_crawl_downloads_images() {
    let server = MockServer::start().await;

    mount_page(&server, "/recipes/page/1", listing(&["soup"])).await;
    mount_recipes(&server, &["soup"]).await;
    Mock::given(method("GET"))
        .and(path("/img/soup.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xd8, 0xff, 0xe0]))
        .mount(&server)
        .await;

    let store = Arc::new(SqliteRecipeStore::new_in_memory().unwrap());
    crawl_sites(
        &test_crawler_config(true),
        &test_user_agent(),
        RecipeExtractor::default(),
        vec![paginated_site(&server)],
        Arc::clone(&store),
    )
    .await
    .unwrap();

    let soup = store
        .get_recipe(&format!("{}/soup/", server.uri()))
        .unwrap()
        .unwrap();
    assert_eq!(soup.image_data, Some(vec![0xff, 0xd8, 0xff, 0xe0]));
}

#[tokio::test]
async fn test_configured_crawl_records_run() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/recipes/page/1", listing(&["soup", "stew"])).await;
    mount_recipes(&server, &["soup"]).await;
    mount_page(
        &server,
        "/stew/",
        r#"<html><body><div itemscope itemtype="http://schema.org/Recipe">
            <h1 itemprop="name">Stew</h1>
        </div></body></html>"#
            .to_string(),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");
    let toml = format!(
        r#"
[crawler]
min-delay-ms = 0
max-delay-ms = 0
max-retries = 0

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "{}"

[[site]]
name = "kitchen"
root-url = "{}"
recipe-index-url = "{}/recipes"
links = {{ tag = "div", attribute = "class", value = "post" }}
"#,
        db_path.display(),
        base,
        base
    );

    let config = parse_config(&toml).unwrap();
    let sites = config.build_sites().unwrap();
    let store = Arc::new(SqliteRecipeStore::new(&db_path).unwrap());

    let reports = crawl(&config, "test-hash", sites, Arc::clone(&store))
        .await
        .unwrap();

    // Stew has no author and is rejected under the default policy
    assert_eq!(reports[0].stored, 1);
    assert_eq!(reports[0].insufficient_data, 1);

    let run = store.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!(run.counts.stored, 1);
    assert_eq!(run.counts.skipped, 1);
    assert!(run.finished_at.is_some());

    let stats = load_statistics(&store).unwrap();
    assert_eq!(stats.total_recipes, 1);
    assert_eq!(stats.total_ingredients, 2);

    let export_path = dir.path().join("recipes.json");
    assert_eq!(export_json(&store, &export_path).unwrap(), 1);
    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&export_path).unwrap()).unwrap();
    assert_eq!(exported[0]["name"], "soup");
    assert_eq!(exported[0]["prep_time"], "PT15M");
}

#[tokio::test]
async fn test_sites_crawl_concurrently_into_one_store() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;

    mount_page(&first, "/recipes/page/1", listing(&["soup"])).await;
    mount_recipes(&first, &["soup"]).await;
    mount_page(&second, "/recipes/page/1", listing(&["bread", "stew"])).await;
    mount_recipes(&second, &["bread", "stew"]).await;

    let second_site = SiteAdapter::new(
        "second",
        &second.uri(),
        &format!("{}/recipes", second.uri()),
        LinkSelector::with_class("div", "post"),
    )
    .unwrap();

    let store = Arc::new(SqliteRecipeStore::new_in_memory().unwrap());
    let reports = crawl_sites(
        &test_crawler_config(false),
        &test_user_agent(),
        RecipeExtractor::default(),
        vec![paginated_site(&first), second_site],
        Arc::clone(&store),
    )
    .await
    .unwrap();

    assert_eq!(reports[0].site, "test-kitchen");
    assert_eq!(reports[0].stored, 1);
    assert_eq!(reports[1].site, "second");
    assert_eq!(reports[1].stored, 2);
    assert_eq!(store.count().unwrap(), 3);
}

/// Fails every lookup under one URL prefix, stores everything else in memory
struct BrokenSiteSink {
    inner: MemorySink,
    broken_prefix: String,
}

impl RecipeSink for BrokenSiteSink {
    fn exists(&self, url: &str) -> StorageResult<bool> {
        if url.starts_with(&self.broken_prefix) {
            return Err(StorageError::Poisoned);
        }
        self.inner.exists(url)
    }

    fn add(&self, recipe: &Recipe) -> StorageResult<()> {
        self.inner.add(recipe)
    }

    fn add_if_absent(&self, recipe: &Recipe) -> StorageResult<bool> {
        self.inner.add_if_absent(recipe)
    }

    fn count(&self) -> StorageResult<u64> {
        self.inner.count()
    }
}

#[tokio::test]
async fn test_failing_site_stops_the_other_sites() {
    let healthy = MockServer::start().await;
    let broken = MockServer::start().await;

    let slugs = ["a", "b", "c", "d", "e"];
    mount_page(&healthy, "/recipes/page/1", listing(&slugs)).await;
    for slug in slugs {
        Mock::given(method("GET"))
            .and(path(format!("/{}/", slug)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(recipe_page(slug))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&healthy)
            .await;
    }

    mount_page(&broken, "/recipes/page/1", listing(&["soup"])).await;
    mount_recipes(&broken, &["soup"]).await;

    let broken_site = SiteAdapter::new(
        "broken",
        &broken.uri(),
        &format!("{}/recipes", broken.uri()),
        LinkSelector::with_class("div", "post"),
    )
    .unwrap();

    let sink = Arc::new(BrokenSiteSink {
        inner: MemorySink::new(),
        broken_prefix: format!("{}/", broken.uri()),
    });

    let result = crawl_sites(
        &test_crawler_config(false),
        &test_user_agent(),
        RecipeExtractor::default(),
        vec![paginated_site(&healthy), broken_site],
        Arc::clone(&sink),
    )
    .await;

    assert!(matches!(result, Err(HarvestError::Storage(StorageError::Poisoned))));

    // the healthy site was aborted, so nothing lands after the error
    let stored_at_failure = sink.count().unwrap();
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(sink.count().unwrap(), stored_at_failure);
    assert!(stored_at_failure < slugs.len() as u64);
}
