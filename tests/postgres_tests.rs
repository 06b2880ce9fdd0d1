//! Integration tests against a real PostgreSQL.
//!
//! # Requirements
//!
//! - Docker must be running (testcontainers launches a PostgreSQL container)
//! - Feature flag `integration` must be enabled
//!
//! # Running
//!
//! ```sh
//! cargo test --features integration --test postgres_tests -- --test-threads=1
//! ```
//!
//! # Test isolation
//!
//! All tests share a single PostgreSQL container (via `OnceLock`). Each test
//! creates a fresh pool and truncates every table before running.

#![cfg(feature = "integration")]

use axum_test::TestServer;
use murkylook::config::AppConfig;
use murkylook::core::error::{ApiError, LoadError, StorageError};
use murkylook::core::loader::LoaderOptions;
use murkylook::core::query::{Assignments, BuiltQuery, Filters, OrderBy, Pagination};
use murkylook::server::{AppState, build_router};
use murkylook::services::destination::{
    CreateDestinationInput, PopularScope, UpdateDestinationInput,
};
use murkylook::services::{Loaders, Services, StatsPeriod, VisitScope};
use murkylook::storage::Database;
use murkylook::storage::postgres::execute_on;
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use std::sync::OnceLock;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;

// ---------------------------------------------------------------------------
// Shared test environment (single container, fresh pool per test)
// ---------------------------------------------------------------------------

struct PgTestEnv {
    /// Dropping this stops the container
    _container: testcontainers::ContainerAsync<Postgres>,
    connection_url: String,
}

/// Process-global so the container outlives each `#[tokio::test]` runtime
static TEST_ENV: OnceLock<PgTestEnv> = OnceLock::new();

async fn init_pg_env() -> &'static PgTestEnv {
    if let Some(env) = TEST_ENV.get() {
        return env;
    }

    let container = Postgres::default()
        .start()
        .await
        .expect("Failed to start PostgreSQL container (is Docker running?)");

    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(5432).await.unwrap();
    let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .expect("Failed to connect to PostgreSQL");
    let db = Database::from_pool(pool);
    db.migrate().await.expect("Failed to run migrations");
    db.close().await;

    let _ = TEST_ENV.set(PgTestEnv {
        _container: container,
        connection_url: url,
    });
    TEST_ENV.get().unwrap()
}

/// Fresh pool on the current runtime, with every table emptied
async fn clean_db() -> Database {
    let env = init_pg_env().await;
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&env.connection_url)
        .await
        .expect("Failed to connect to PostgreSQL");
    sqlx::query(
        "TRUNCATE highlight_views, visits, destination_categories, highlights, \
         destinations, destination_types, categories, countries, continents, users, \
         languages RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .expect("Failed to truncate tables");
    Database::from_pool(pool)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct Seed {
    europe: i64,
    asia: i64,
    france: i64,
    japan: i64,
    hidden_country: i64,
    paris: i64,
    kyoto: i64,
    museums: i64,
    ada: i64,
}

async fn seed(services: &Services) -> Seed {
    let continent = |name: &'static str, slug: &'static str, code: &'static str| {
        Assignments::new()
            .set("name", name)
            .set("slug", slug)
            .set("code", code)
    };
    let europe = services
        .continents
        .create(&continent("Europe", "europe", "EU"))
        .await
        .unwrap()
        .id;
    let asia = services
        .continents
        .create(&continent("Asia", "asia", "AS"))
        .await
        .unwrap()
        .id;

    let country = |continent_id: i64, name: &'static str, iso: &'static str| {
        Assignments::new()
            .set("continent_id", continent_id)
            .set("name", name)
            .set("iso_code", iso)
    };
    let france = services
        .countries
        .create(&country(europe, "France", "FR"))
        .await
        .unwrap()
        .id;
    let japan = services
        .countries
        .create(&country(asia, "Japan", "JP"))
        .await
        .unwrap()
        .id;
    let hidden_country = services
        .countries
        .create(&country(europe, "Atlantis", "AT"))
        .await
        .unwrap()
        .id;
    services.countries.delete(hidden_country).await.unwrap();

    let museums = services
        .categories
        .create(&Assignments::new().set("name", "Museums"))
        .await
        .unwrap()
        .id;

    let destination = |country_id: i64, name: &'static str, slug: &'static str| {
        Assignments::new()
            .set("country_id", country_id)
            .set("name", name)
            .set("slug", slug)
    };
    let paris = services
        .destinations
        .create(&destination(france, "Paris", "paris"))
        .await
        .unwrap()
        .id;
    services
        .destinations
        .create(&destination(france, "Lyon", "lyon"))
        .await
        .unwrap();
    let kyoto = services
        .destinations
        .create(&destination(japan, "Kyoto", "kyoto"))
        .await
        .unwrap()
        .id;

    let ada = services
        .users
        .create(
            &Assignments::new()
                .set("name", "Ada")
                .set("username", "ada")
                .set("email", "ada@example.com"),
        )
        .await
        .unwrap()
        .id;

    for (destination_id, rating) in [(paris, 5i64), (paris, 4), (kyoto, 3)] {
        services
            .visits
            .create(
                &Assignments::new()
                    .set("user_id", ada)
                    .set("destination_id", destination_id)
                    .set("rating", rating),
            )
            .await
            .unwrap();
    }

    Seed {
        europe,
        asia,
        france,
        japan,
        hidden_country,
        paris,
        kyoto,
        museums,
        ada,
    }
}

async fn count_rows(db: &Database, table: &str) -> i64 {
    db.fetch_count(&BuiltQuery::new(format!("SELECT COUNT(*) FROM {}", table)))
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_lookup_and_soft_delete() {
    let db = clean_db().await;
    let services = Services::new(db.clone());
    let seed = seed(&services).await;

    let europe = services.continents.find_by_code("eu").await.unwrap().unwrap();
    assert_eq!(europe.id, seed.europe);

    assert!(services.countries.find_by_id(seed.hidden_country).await.unwrap().is_none());
    assert!(!services.countries.delete(seed.hidden_country).await.unwrap());

    let page = services
        .countries
        .find_all(&Filters::new(), None, None)
        .await
        .unwrap();
    let names: Vec<_> = page.items.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["France", "Japan"]);
    assert_eq!(page.total_count, 2);
}

#[tokio::test]
async fn test_find_all_filters_orders_and_pages() {
    let db = clean_db().await;
    let services = Services::new(db.clone());
    let seed = seed(&services).await;

    let filters = Filters::new().with("country_id", seed.france);
    let page = services
        .destinations
        .find_all(&filters, Some(Pagination::new(1, 0)), Some(OrderBy::NameDesc))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].name, "Paris");
    assert_eq!(page.total_count, 2);
    assert!(page.has_more);

    let popular = services
        .destinations
        .find_all(&Filters::new(), None, Some(OrderBy::VisitsDesc))
        .await
        .unwrap();
    assert_eq!(popular.items[0].id, seed.paris);

    let rated = services
        .destinations
        .find_all(&Filters::new().with("rating_min", 4.0), None, None)
        .await
        .unwrap();
    assert_eq!(rated.total_count, 1);
}

#[tokio::test]
async fn test_unknown_filter_never_reaches_the_database() {
    let db = clean_db().await;
    let services = Services::new(db);

    let err = services
        .continents
        .find_all(&Filters::new().with("altitude", 3i64), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::QueryBuild(_)));
}

#[tokio::test]
async fn test_stats() {
    let db = clean_db().await;
    let services = Services::new(db);
    let seed = seed(&services).await;

    let stats = services.continents.stats(seed.europe).await.unwrap();
    assert_eq!(stats.total_countries, 1);
    assert_eq!(stats.total_destinations, 2);
    assert_eq!(stats.total_visits, 2);

    let stats = services.destinations.stats(seed.paris).await.unwrap();
    assert_eq!(stats.total_visits, 2);
    assert_eq!(stats.average_rating, Some(4.5));

    let stats = services.users.stats(seed.ada).await.unwrap();
    assert_eq!(stats.countries_visited, 2);
    assert_eq!(stats.continents_visited, 2);

    let ids = services.countries.ids_by_continent(seed.asia).await.unwrap();
    assert_eq!(ids, vec![seed.japan]);
}

#[tokio::test]
async fn test_rankings() {
    let db = clean_db().await;
    let services = Services::new(db);
    let seed = seed(&services).await;

    let continents = services.continents.top_by_visits(5).await.unwrap();
    assert_eq!(continents, vec![seed.europe, seed.asia]);

    let countries = services.countries.top_by_visits(None, 10).await.unwrap();
    assert_eq!(countries, vec![seed.france, seed.japan]);
    let countries = services
        .countries
        .top_by_visits(Some(seed.asia), 10)
        .await
        .unwrap();
    assert_eq!(countries, vec![seed.japan]);

    // paris: 2 visits rated 4.5 on average; kyoto: 1 visit rated 3; lyon: none
    let popular = services
        .destinations
        .popular(PopularScope::default(), 2)
        .await
        .unwrap();
    assert_eq!(popular, vec![seed.paris, seed.kyoto]);
    let in_japan = PopularScope {
        continent_id: Some(seed.asia),
        ..Default::default()
    };
    assert_eq!(
        services.destinations.popular(in_japan, 10).await.unwrap(),
        vec![seed.kyoto]
    );
    let museums = PopularScope {
        category_id: Some(seed.museums),
        ..Default::default()
    };
    assert!(services.destinations.popular(museums, 10).await.unwrap().is_empty());

    let recent = services.destinations.recently_visited(10).await.unwrap();
    assert_eq!(recent, vec![seed.kyoto, seed.paris]);

    let trending = services
        .destinations
        .trending(StatsPeriod::days(30), 10)
        .await
        .unwrap();
    assert_eq!(trending, vec![seed.paris, seed.kyoto]);
}

#[tokio::test]
async fn test_global_and_period_statistics() {
    let db = clean_db().await;
    let services = Services::new(db);
    let seed = seed(&services).await;

    let global = services.statistics.global_stats().await.unwrap();
    assert_eq!(global.total_users, 1);
    assert_eq!(global.total_visits, 3);
    assert_eq!(global.total_destinations, 3);
    assert_eq!(global.total_countries, 2);
    assert_eq!(global.total_continents, 2);
    assert_eq!(global.recent_visits_count, 3);
    assert_eq!(global.average_visits_per_user, 3.0);
    assert_eq!(global.most_visited_destination_id, Some(seed.paris));
    assert_eq!(global.most_active_user_id, Some(seed.ada));

    let histogram = services
        .statistics
        .visits_by_period(VisitScope::All, StatsPeriod::default())
        .await
        .unwrap();
    assert_eq!(histogram.len(), 1);
    assert_eq!(histogram[0].visit_count, 3);

    let europe = services
        .continent_stats(seed.europe, StatsPeriod::days(7))
        .await
        .unwrap();
    assert_eq!(europe.total_visits, 2);
    assert_eq!(europe.visits_by_period.len(), 1);
    assert_eq!(europe.visits_by_period[0].visit_count, 2);

    let update = UpdateDestinationInput {
        category_ids: Some(vec![seed.museums]),
        ..Default::default()
    };
    services
        .destinations
        .update_with_categories(seed.paris, &update)
        .await
        .unwrap();
    let museums = services
        .category_stats(seed.museums, StatsPeriod::default())
        .await
        .unwrap();
    assert_eq!(museums.total_destinations, 1);
    assert_eq!(museums.total_visits, 2);
    assert_eq!(museums.average_visits_per_destination, 2.0);
    assert_eq!(museums.visits_by_period[0].visit_count, 2);
}

#[tokio::test]
async fn test_record_highlight_view() {
    let db = clean_db().await;
    let services = Services::new(db);
    let seed = seed(&services).await;

    let highlight = services
        .highlights
        .create(
            &Assignments::new()
                .set("destination_id", seed.kyoto)
                .set("name", "Fushimi Inari")
                .set("slug", "fushimi-inari"),
        )
        .await
        .unwrap();

    assert_eq!(services.highlights.record_view(highlight.id, seed.ada).await.unwrap(), 1);
    assert_eq!(services.highlights.record_view(highlight.id, seed.ada).await.unwrap(), 2);

    let err = services.highlights.record_view(9999, seed.ada).await.unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_failed_transaction_leaves_nothing_behind() {
    let db = clean_db().await;

    let result: Result<(), StorageError> = db
        .transaction(|conn| {
            Box::pin(async move {
                let insert = BuiltQuery::with_params(
                    "INSERT INTO categories (name) VALUES ($1)",
                    vec!["Beaches".into()],
                );
                execute_on(&mut *conn, &insert).await?;
                let second = BuiltQuery::with_params(
                    "INSERT INTO languages (code, name) VALUES ($1, $2)",
                    vec!["fr".into(), "French".into()],
                );
                execute_on(&mut *conn, &second).await?;
                Err::<(), _>(StorageError::Bind("injected failure".into()))
            })
        })
        .await;

    assert!(matches!(result, Err(StorageError::Transaction(_))));
    assert_eq!(count_rows(&db, "categories").await, 0);
    assert_eq!(count_rows(&db, "languages").await, 0);
}

#[tokio::test]
async fn test_create_destination_links_categories_atomically() {
    let db = clean_db().await;
    let services = Services::new(db.clone());
    let seed = seed(&services).await;

    let input = CreateDestinationInput {
        country_id: seed.france,
        type_id: None,
        name: "Nice".into(),
        slug: "nice".into(),
        description: None,
        latitude: Some(43.7),
        longitude: Some(7.26),
        image_url: None,
        category_ids: Some(vec![seed.museums]),
    };
    let nice = services.destinations.create_with_categories(&input).await.unwrap();
    assert_eq!(
        services.categories.ids_by_destination(nice.id).await.unwrap(),
        vec![seed.museums]
    );

    let before = count_rows(&db, "destinations").await;
    let broken = CreateDestinationInput {
        slug: "marseille".into(),
        name: "Marseille".into(),
        category_ids: Some(vec![seed.museums, 404]),
        ..input
    };
    let err = services
        .destinations
        .create_with_categories(&broken)
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "TRANSACTION_FAILED");
    assert_eq!(count_rows(&db, "destinations").await, before);
    assert!(services.destinations.find_by_slug("marseille").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_destination_replaces_categories() {
    let db = clean_db().await;
    let services = Services::new(db);
    let seed = seed(&services).await;

    let outdoors = services
        .categories
        .create(&Assignments::new().set("name", "Outdoors"))
        .await
        .unwrap()
        .id;

    let before = services.destinations.get(seed.kyoto).await.unwrap();
    let update = UpdateDestinationInput {
        category_ids: Some(vec![seed.museums, outdoors]),
        ..Default::default()
    };
    let kyoto = services
        .destinations
        .update_with_categories(seed.kyoto, &update)
        .await
        .unwrap();
    assert_eq!(kyoto.name, "Kyoto");
    // Relinking alone still counts as a modification of the destination
    assert!(kyoto.updated_at > before.updated_at);

    let update = UpdateDestinationInput {
        name: Some("Kyōto".into()),
        category_ids: Some(vec![outdoors]),
        ..Default::default()
    };
    let kyoto = services
        .destinations
        .update_with_categories(seed.kyoto, &update)
        .await
        .unwrap();
    assert_eq!(kyoto.name, "Kyōto");
    assert_eq!(
        services.destinations.ids_by_category(outdoors).await.unwrap(),
        vec![seed.kyoto]
    );
    assert!(services.destinations.ids_by_category(seed.museums).await.unwrap().is_empty());

    let err = services
        .destinations
        .update_with_categories(9999, &update)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_loader_batches_against_postgres() {
    let db = clean_db().await;
    let services = Services::new(db.clone());
    let seed = seed(&services).await;
    let loaders = Loaders::new(&db, LoaderOptions::default());

    let results = loaders
        .countries
        .load_many(&[seed.japan, seed.hidden_country, seed.france, 9999])
        .await;

    assert_eq!(results[0].as_ref().unwrap().name, "Japan");
    assert!(matches!(results[1], Err(LoadError::NotFound { .. })));
    assert_eq!(results[2].as_ref().unwrap().name, "France");
    assert!(results[3].as_ref().unwrap_err().is_not_found());
    assert_eq!(loaders.dispatch_count(), 1);
}

// ---------------------------------------------------------------------------
// HTTP / GraphQL
// ---------------------------------------------------------------------------

async fn make_server(db: &Database) -> TestServer {
    let config = AppConfig::default();
    let state = AppState::new(db.clone(), &config);
    TestServer::new(build_router(state, &config.server))
}

#[tokio::test]
async fn test_health() {
    let db = clean_db().await;
    let server = make_server(&db).await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ok");
}

#[tokio::test]
async fn test_graphql_nested_relations() {
    let db = clean_db().await;
    let services = Services::new(db.clone());
    seed(&services).await;
    let server = make_server(&db).await;

    let response = server
        .post("/graphql")
        .json(&json!({
            "query": "{ countries(orderBy: NAME_ASC) { totalCount items { name \
                      continent { name } destinations { slug visits { rating } } } } }"
        }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert!(body.get("errors").is_none(), "unexpected errors: {}", body);
    let countries = &body["data"]["countries"];
    assert_eq!(countries["totalCount"], 2);
    assert_eq!(countries["items"][0]["name"], "France");
    assert_eq!(countries["items"][0]["continent"]["name"], "Europe");
    assert_eq!(countries["items"][0]["destinations"][0]["slug"], "lyon");
    assert_eq!(countries["items"][1]["destinations"][0]["slug"], "kyoto");
}

#[tokio::test]
async fn test_graphql_mutation_validation_and_errors() {
    let db = clean_db().await;
    let server = make_server(&db).await;

    let response = server
        .post("/graphql")
        .json(&json!({
            "query": "mutation { createContinent(input: { name: \"Oceania\", \
                      slug: \"Not Valid\", code: \"OC\" }) { id } }"
        }))
        .await;
    let body: Value = response.json();
    assert_eq!(body["errors"][0]["extensions"]["code"], "VALIDATION_ERROR");
    assert_eq!(count_rows(&db, "continents").await, 0);

    let response = server
        .post("/graphql")
        .json(&json!({
            "query": "mutation { createContinent(input: { name: \"Oceania\", \
                      slug: \"oceania\", code: \"oc\" }) { id code } }"
        }))
        .await;
    let body: Value = response.json();
    assert_eq!(body["data"]["createContinent"]["code"], "OC");

    let response = server
        .post("/graphql")
        .json(&json!({ "query": "mutation { updateCountry(id: 77, input: { name: \"X\" }) { id } }" }))
        .await;
    let body: Value = response.json();
    assert_eq!(body["errors"][0]["extensions"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_graphql_statistics_queries() {
    let db = clean_db().await;
    let services = Services::new(db.clone());
    seed(&services).await;
    let server = make_server(&db).await;

    let response = server
        .post("/graphql")
        .json(&json!({
            "query": "{ globalStats { totalVisits mostVisitedDestination { slug } \
                      mostActiveUser { username } } \
                      topContinentsByVisits { code } \
                      popularDestinations(limit: 1) { slug } \
                      recentVisits { totalCount hasMore items { rating } } \
                      visitsByPeriod(period: { period: DAY, count: 7 }) { visitCount } }"
        }))
        .await;
    let body: Value = response.json();
    assert!(body.get("errors").is_none(), "unexpected errors: {}", body);
    let data = &body["data"];
    assert_eq!(data["globalStats"]["totalVisits"], 3);
    assert_eq!(data["globalStats"]["mostVisitedDestination"]["slug"], "paris");
    assert_eq!(data["globalStats"]["mostActiveUser"]["username"], "ada");
    assert_eq!(data["topContinentsByVisits"][0]["code"], "EU");
    assert_eq!(data["popularDestinations"][0]["slug"], "paris");
    assert_eq!(data["recentVisits"]["totalCount"], 3);
    assert_eq!(data["recentVisits"]["hasMore"], false);
    assert_eq!(data["visitsByPeriod"][0]["visitCount"], 3);

    let response = server
        .post("/graphql")
        .json(&json!({ "query": "{ trendingDestinations(limit: 0) { id } }" }))
        .await;
    let body: Value = response.json();
    assert!(body["errors"][0]["message"].is_string());
}
