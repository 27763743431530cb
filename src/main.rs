//! Walks a record through the loopback engine and prints it in every
//! supported format.
//!
//! Usage:
//!   RUST_LOG=flist_module=debug flist_demo

use flist_module::{
    Client, ClientConfig, LoopbackEngine, Result, ResultShape, SearchBuilder, SearchOutcome, StaticDirectory,
    XmlStyle, flist,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    let config = ClientConfig::default();
    let filter = EnvFilter::builder()
        .with_default_directive(config.log_level.to_level_filter().into())
        .from_env_lossy();
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let client = Client::with_config(LoopbackEngine::new(), StaticDirectory::builtin(), config)?;

    let account = client.flist_from(flist!({
        "PIN_FLD_POID" => ("/account", 12345),
        "PIN_FLD_NAME" => "Alice",
        "PIN_FLD_STATUS" => 10100,
        "PIN_FLD_CREATED_T" => 1_548_979_200i64,
        "PIN_FLD_INHERITED_INFO" => { "PIN_FLD_RATE_TAG" => "premium" },
        "PIN_FLD_RESULTS" => [ { "PIN_FLD_STATUS" => 1 }, { "PIN_FLD_STATUS" => 2 } ],
    }))?;
    info!(fields = account.count(true), "built account record");

    println!("{}", client.to_text(&account)?);
    println!("{}", account.to_json()?);
    println!("{}", account.to_xml(XmlStyle::ByType)?);

    let txn = client.transaction("/account")?;
    let echoed = client.execute(&account, "PCM_OP_TEST_LOOPBACK", 0u32)?;
    txn.commit()?;
    info!(same = echoed == account, "loopback echoed the account");

    let search = SearchBuilder::new("select X from /account where F1 = V1 ")
        .arg("PIN_FLD_STATUS", 10100)
        .results(ResultShape::names(["PIN_FLD_POID", "PIN_FLD_NAME"]));
    println!("{}", search.build(client.context())?.to_json()?);
    if let SearchOutcome::Records(records) = client.search(&search)? {
        info!(matches = records.len(), "search finished");
    }

    client.close()
}
