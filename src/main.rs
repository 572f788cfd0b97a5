use std::sync::Arc;

use rust_decimal_macros::dec;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bookstore_orders::config::Config;
use bookstore_orders::domain::cart::CartCommandHandler;
use bookstore_orders::domain::catalog::{Book, Member};
use bookstore_orders::domain::identity::Caller;
use bookstore_orders::domain::order::OrderCommandHandler;
use bookstore_orders::metrics::{self, Metrics};
use bookstore_orders::store::{CartStore, MemoryStore, OrderStore, PgStore};
use bookstore_orders::utils::RetryConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bookstore_orders=debug"))
        )
        .init();

    tracing::info!("🚀 Starting bookstore order engine");
    let config = Config::from_env();

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    if config.metrics_enabled {
        let registry = Arc::new(metrics.registry().clone());
        let port = config.metrics_port;
        actix_web::rt::spawn(async move {
            if let Err(e) = metrics::start_metrics_server(registry, port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    }

    // === 2. Store and demo catalog ===
    let book = Book::new("The Rust Programming Language", dec!(39.95)).with_sale_discount(dec!(5.00));
    let second_book = Book::new("Designing Data-Intensive Applications", dec!(44.99));
    let member = Member::new("M-0001", "Ada", "Lovelace", "ada@example.com");

    let (orders, carts) = open_store(&config, &[&book, &second_book], &member).await?;

    let handler = OrderCommandHandler::new(
        orders.clone(),
        metrics.clone(),
        RetryConfig::for_order_saves(&config),
    );
    let cart_handler = CartCommandHandler::new(carts, orders, metrics.clone());

    // === 3. Demonstrate the order lifecycle ===
    let claim = member.id.to_string();
    let caller = Caller::from_claim(Some(&claim));
    tracing::info!("📝 Demonstrating order lifecycle for {}", member.full_name());

    let staged = cart_handler.stage_item(&caller, second_book.id, Some(1)).await?;
    tracing::info!("🛒 Cart staged: {} row(s), {}", staged.items.len(), staged.total_display);

    handler.add_to_cart(&caller, book.id, None).await?;
    let cart = handler.add_to_cart(&caller, book.id, Some(2)).await?;
    tracing::info!("✅ Cart order {} holds {} unit(s)", cart.id, cart.item_count());

    let direct = handler.buy_now(&caller, second_book.id, None).await?;
    tracing::info!("✅ Buy-now order {} placed", direct.id);

    let cancelled = handler.cancel_item(&caller, direct.items[0].id).await?;
    tracing::info!("✅ Buy-now order {} is now {}", cancelled.id, cancelled.status);

    let placed = handler.place_order(&caller, cart.id).await?;
    let details = handler.order_details(&caller, placed.id).await?;
    tracing::info!(
        "🧾 Order {}: subtotal {}, member discount {}, total {}",
        details.order_id,
        details.subtotal_display,
        details.member_discount_display,
        details.total_display
    );

    let history = handler.member_orders(&caller).await?;
    tracing::info!("📚 Member has {} order(s)", history.len());

    if config.metrics_enabled {
        tracing::info!("⏳ Serving metrics until Ctrl-C");
        tokio::signal::ctrl_c().await?;
    }

    tracing::info!("🎉 Demo complete!");
    Ok(())
}

/// PostgreSQL when `DATABASE_URL` is set, otherwise the in-memory store
async fn open_store(
    config: &Config,
    books: &[&Book],
    member: &Member,
) -> anyhow::Result<(Arc<dyn OrderStore>, Arc<dyn CartStore>)> {
    match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL...");
            let store = Arc::new(PgStore::connect(config, url).await?);
            store.ensure_schema().await?;
            for book in books {
                store.upsert_book(book).await?;
            }
            store.upsert_member(member).await?;

            let orders: Arc<dyn OrderStore> = store.clone();
            let carts: Arc<dyn CartStore> = store;
            Ok((orders, carts))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            let store = Arc::new(MemoryStore::new());
            for book in books {
                store.put_book((*book).clone()).await;
            }
            store.put_member(member.clone()).await;

            let orders: Arc<dyn OrderStore> = store.clone();
            let carts: Arc<dyn CartStore> = store;
            Ok((orders, carts))
        }
    }
}
