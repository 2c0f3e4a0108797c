use atena_auto::domain::ports::{SystemClock, UuidLabelIds};
use atena_auto::utils::logger;
use atena_auto::{
    ClickPostBrowserGateway, CliConfig, ErrorKind, IssueLabelUseCase, IssueRequest, LabelIssuer,
    MemoryLabelStore, MemoryOrderStore, Order, WebDriverFactory, YamatoBrowserGateway,
};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);
    tracing::info!("Starting atena-auto");

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(2);
    }

    // Orders come in via mailbox polling elsewhere; here we seed the store
    // from a JSON export.
    let orders = MemoryOrderStore::new();
    match tokio::fs::read(&config.orders_file).await {
        Ok(bytes) => {
            let seeded: Vec<Order> = serde_json::from_slice(&bytes)?;
            tracing::info!("Seeded {} order(s) from {}", seeded.len(), config.orders_file);
            orders.seed(seeded).await;
        }
        Err(e) => {
            tracing::warn!("Orders file {} not readable: {}", config.orders_file, e);
        }
    }
    let labels = MemoryLabelStore::new();

    let factory = WebDriverFactory::new(&config.webdriver_url, &config.download_dir)
        .with_headless(!config.manual_login);
    let automation = config.automation();

    let clickpost = ClickPostBrowserGateway::new(
        factory.clone(),
        config.clickpost_credentials(),
        automation.clone(),
        SystemClock,
        UuidLabelIds,
    );
    let yamato = YamatoBrowserGateway::new(
        factory,
        config.yamato_credentials(),
        automation,
        SystemClock,
        UuidLabelIds,
    );

    let use_case = IssueLabelUseCase::new(LabelIssuer::new(clickpost, yamato), orders, labels);

    let request = IssueRequest {
        order_id: config.order_id.clone(),
        shipping_method: config.shipping_method.clone(),
    };

    match use_case.execute(request).await {
        Ok(result) => {
            tracing::info!("✅ Label issued: {}", result.label_id);
            for warning in &result.warnings {
                tracing::warn!("⚠️ {}", warning);
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Err(e) if e.is_dry_run_stop() => {
            tracing::info!("🛑 Dry run: stopped at the confirmation screen before payment");
            println!("dry run: reached confirmation, stopped before payment");
        }
        Err(e) => {
            tracing::error!("❌ Label issuance failed: {}", e);
            if let Some(cause) = std::error::Error::source(&e) {
                tracing::error!("Caused by: {}", cause);
            }
            eprintln!("❌ {}", e);

            let exit_code = match e.kind() {
                ErrorKind::Validation | ErrorKind::Conflict => 2,
                ErrorKind::NotFound => 3,
                ErrorKind::External => 1,
                ErrorKind::Internal => 4,
            };
            std::process::exit(exit_code);
        }
    }

    Ok(())
}
