use dotenvy::dotenv;

use clinicore::logging::init_tracing;
use clinicore::router::init_router;
use clinicore::state::init_app_state;

#[tokio::main]
async fn main() {
    dotenv().ok();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "create-admin" {
        handle_create_admin(args).await;
        return;
    }

    init_tracing();

    let state = init_app_state().await;
    let app = init_router(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(3000);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .unwrap();
    println!("🚀 Server running on http://localhost:{port}");
    println!("📚 Swagger UI available at http://localhost:{port}/swagger-ui");
    axum::serve(listener, app).await.unwrap();
}

async fn handle_create_admin(args: Vec<String>) {
    if args.len() != 7 {
        eprintln!(
            "Usage: {} create-admin <tenant> <first_name> <last_name> <email> <password>",
            args[0]
        );
        std::process::exit(1);
    }

    let tenant = &args[2];
    let first_name = &args[3];
    let last_name = &args[4];
    let email = &args[5];
    let password = &args[6];

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    match clinicore::cli::create_tenant_admin(&pool, tenant, first_name, last_name, email, password)
        .await
    {
        Ok(user_id) => {
            println!("✅ Tenant admin created successfully!");
            println!("   Tenant: {}", tenant);
            println!("   Email: {}", email);
            println!("   User id: {}", user_id);
        }
        Err(e) => {
            eprintln!("❌ Error creating tenant admin: {}", e);
            std::process::exit(1);
        }
    }
}
