// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # HashDrop Node
//!
//! Entry point for the `hashdrop-node` binary. Parses CLI arguments,
//! initializes logging and metrics, hosts the escrow, runs the expiry keeper,
//! and serves the HTTP API.
//!
//! The binary supports four subcommands:
//!
//! - `run`     — start the keeper, API and metrics servers
//! - `demo`    — walk one order through its lifecycle in-process
//! - `keygen`  — generate a fresh Ed25519 identity
//! - `version` — print build version information

mod api;
mod cli;
mod keeper;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::{OsRng, StdRng};
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use hashdrop_contracts::{
    Account, AcceptOrderRequest, ConfirmDeliveryRequest, ConfirmPickupRequest, CreateOrderRequest,
    EscrowParams, HashDropEscrow, InMemoryLedger, Ledger, PrincipalRecipient,
};
use hashdrop_protocol::crypto::{Address, Ed25519Scheme, Keypair};
use hashdrop_protocol::zkp::{build_proof, commitment, Groth16Prover, PoseidonHasher};
use hashdrop_protocol::{config, pickup};

use cli::{Commands, HashDropNodeCli};
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = HashDropNodeCli::parse();

    match cli.command {
        Commands::Run(args) => {
            logging::init_logging(logging::DEFAULT_DIRECTIVES, cli.log_format);
            run_node(args).await
        }
        Commands::Demo(args) => {
            logging::init_logging(logging::DEFAULT_DIRECTIVES, cli.log_format);
            run_demo(args)
        }
        Commands::Keygen => {
            keygen();
            Ok(())
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Builds the escrow parameters from the `run` flags.
fn escrow_params(args: &cli::RunArgs) -> Result<EscrowParams> {
    let mut params = EscrowParams::default();
    if let Some(hex) = &args.arbiter {
        let arbiter: Address = hex.parse().context("invalid --arbiter address")?;
        params = params.with_arbiter(arbiter);
    }
    if args.principal_to_receiver {
        params = params.with_principal_recipient(PrincipalRecipient::Receiver);
    }
    Ok(params)
}

/// Starts the keeper loop, the API server and the metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    let params = escrow_params(&args)?;

    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        sweep_interval_secs = args.sweep_interval_secs,
        arbiter = ?params.arbiter,
        principal_recipient = ?params.principal_recipient,
        "starting hashdrop-node"
    );

    // --- Ledger ---
    let ledger = Arc::new(InMemoryLedger::new(keeper::wall_clock_secs()));

    // --- Proof system ---
    // Local setup; production deployments load a verifying key from a
    // ceremony instead.
    let (_, verifier) =
        Groth16Prover::setup(&mut OsRng).context("groth16 setup for the delivery circuit")?;
    tracing::info!(circuit = %config::DELIVERY_CIRCUIT_ID, "delivery proof verifier ready");

    // --- Escrow ---
    let escrow = Arc::new(HashDropEscrow::new(
        params,
        ledger.clone(),
        Arc::new(verifier),
    ));

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());

    // --- API server ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            config::PROTOCOL_VERSION,
        ),
        escrow: Arc::clone(&escrow),
        metrics: Arc::clone(&node_metrics),
    };
    let api_router = api::create_router(app_state);
    let api_addr = format!("{}:{}", args.bind, args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {api_addr}"))?;
    tracing::info!(addr = %api_addr, "API server listening");

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("{}:{}", args.bind, args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {metrics_addr}"))?;
    tracing::info!(addr = %metrics_addr, "metrics server listening");

    // --- Keeper ---
    let keeper_task = tokio::spawn(keeper::run(
        Arc::clone(&escrow),
        ledger,
        Arc::clone(&node_metrics),
        Duration::from_secs(args.sweep_interval_secs.max(1)),
    ));

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!(error = %e, "API server error");
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!(error = %e, "metrics server error");
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    keeper_task.abort();
    tracing::info!("hashdrop-node stopped");
    Ok(())
}

/// Runs one order from creation to delivery against an in-memory ledger,
/// then a second one into expiry, printing balances as it goes.
fn run_demo(args: cli::DemoArgs) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let hasher = PoseidonHasher::new();

    println!("HashDrop demo (seed {})", args.seed);
    println!("  setting up the delivery circuit...");
    let (prover, verifier) = Groth16Prover::setup(&mut rng).context("groth16 setup")?;

    let start = keeper::wall_clock_secs();
    let ledger = Arc::new(InMemoryLedger::new(start));
    let escrow = HashDropEscrow::new(
        EscrowParams::default(),
        ledger.clone(),
        Arc::new(verifier),
    );

    let emitter = Keypair::generate();
    let receiver = Keypair::generate().address();
    let courier = Keypair::generate().address();
    let funding = args.package_value.saturating_mul(4);
    ledger.mint(Account::Party(emitter.address()), funding);
    ledger.mint(Account::Party(courier), funding);

    let show = |label: &str| {
        println!(
            "  {label:<12} emitter={} courier={} receiver={} treasury={} insurance={}",
            ledger.balance(&Account::Party(emitter.address())),
            ledger.balance(&Account::Party(courier)),
            ledger.balance(&Account::Party(receiver)),
            ledger.balance(&Account::Treasury),
            ledger.balance(&Account::InsurancePool),
        );
    };
    show("funded");

    // 1. Emitter draws a secret and shares it with the receiver off-ledger.
    let (secret, commitment) = commitment::generate(&hasher, &mut rng);
    let order_id = escrow.create_order(CreateOrderRequest {
        emitter: emitter.address(),
        receiver,
        package_value: args.package_value,
        delivery_fee: args.delivery_fee,
        secret_commitment: commitment,
        delivery_zone_commitment: hashdrop_protocol::crypto::blake3_hash(b"demo delivery zone"),
        encrypted_details_ref: "ipfs://demo-order".into(),
    })?;
    show("created");

    // 2. Courier locks collateral.
    escrow.accept_order(AcceptOrderRequest { order_id, courier })?;
    show("accepted");

    // 3. Emitter hands the parcel over and signs the pickup.
    let signature = pickup::sign(&Ed25519Scheme, &emitter, order_id.0, &courier, ledger.now());
    escrow.confirm_pickup(ConfirmPickupRequest {
        order_id,
        courier,
        signature,
    })?;
    show("picked up");

    // 4. Receiver reveals the secret; courier proves and settles.
    ledger.advance(45 * 60);
    let (proof, signals) = build_proof(&prover, &hasher, &secret, &commitment, order_id.0, &courier)
        .context("building the delivery proof")?;
    println!("  proof        {} bytes", proof.size());
    escrow.confirm_delivery(ConfirmDeliveryRequest {
        order_id,
        courier,
        secret,
        proof,
        signals,
    })?;
    show("delivered");

    // 5. A second order nobody picks up.
    let (_, stale_commitment) = commitment::generate(&hasher, &mut rng);
    let stale = escrow.create_order(CreateOrderRequest {
        emitter: emitter.address(),
        receiver,
        package_value: args.package_value,
        delivery_fee: args.delivery_fee,
        secret_commitment: stale_commitment,
        delivery_zone_commitment: [0; 32],
        encrypted_details_ref: String::new(),
    })?;
    ledger.advance(config::ORDER_EXPIRY_SECS + 1);
    let swept = escrow.sweep_expired();
    println!("  swept        {swept:?} (order {stale} expired)");
    show("final");

    println!("  events:");
    for event in escrow.take_events() {
        println!("    {}", serde_json::to_string(&event)?);
    }
    Ok(())
}

/// Prints a fresh Ed25519 identity to stdout.
fn keygen() {
    let keypair = Keypair::generate();
    println!("address: {}", keypair.address());
    println!("secret:  {}", hex::encode(keypair.secret_key_bytes()));
}

/// Prints version information to stdout.
fn print_version() {
    println!("hashdrop-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol      {}", config::PROTOCOL_VERSION);
    println!("circuit       {}", config::DELIVERY_CIRCUIT_ID);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
