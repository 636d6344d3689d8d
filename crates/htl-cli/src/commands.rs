use anyhow::Context;
use colored::Colorize;
use htl_contract::{
    Batch, ContractError, EventStamp, LabResult, Member, NewBatch, PackingList, Product,
    QueryResults, Record, RecordPayload, SupplyChainContract, WeightTally,
};
use htl_store::JournaledRecordStore;
use htl_types::{Clock, SystemClock};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::cli::*;
use crate::config::CliConfig;

type Contract = SupplyChainContract<JournaledRecordStore>;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::resolve(cli.config.as_deref(), cli.store)?;
    let output = execute(cli.command, &config, cli.format)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

/// Run one command against the configured store and render its result.
pub fn execute(command: Command, config: &CliConfig, format: OutputFormat) -> anyhow::Result<String> {
    let store = JournaledRecordStore::open(&config.store_path, config.journal.clone())
        .with_context(|| format!("failed to open store {}", config.store_path.display()))?;
    let contract = SupplyChainContract::with_config(store, config.contract.clone());

    match command {
        Command::Init => cmd_init(&contract, format),
        Command::RegisterMember(args) => cmd_register_member(&contract, args, format),
        Command::CreateBatch(args) => cmd_create_batch(&contract, args, format),
        Command::CreateProduct(args) => cmd_create_product(&contract, args, format),
        Command::LabResult(args) => cmd_lab_result(&contract, args, format),
        Command::PackingList(args) => cmd_packing_list(&contract, args, format),
        Command::WeightTally(args) => cmd_weight_tally(&contract, args, format),
        Command::Get(args) => cmd_get(&contract, args, format),
        Command::Delete(args) => cmd_delete(&contract, args, format),
        Command::List => {
            let results = contract.list_all()?;
            render_results(&results, format)
        }
        Command::Query(args) => {
            let results = contract.query_with_selector(&args.selector)?;
            render_results(&results, format)
        }
        Command::Compact => cmd_compact(&contract, format),
    }
}

fn cmd_init(contract: &Contract, format: OutputFormat) -> anyhow::Result<String> {
    contract.init();
    let store = contract.store();
    render(
        format,
        &json!({"store": store.path().display().to_string(), "records": store.len()}),
        || {
            format!(
                "{} Store ready at {} ({} records)",
                "✓".green().bold(),
                store.path().display().to_string().bold(),
                store.len()
            )
        },
    )
}

fn cmd_register_member(
    contract: &Contract,
    args: RegisterMemberArgs,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let member = contract.register_member(
        &args.id,
        &args.organization,
        &args.address,
        &args.member_type,
    )?;
    render(format, &member, || {
        format!("{} Registered {}", "✓".green().bold(), describe_member(&member))
    })
}

fn cmd_create_batch(
    contract: &Contract,
    args: CreateBatchArgs,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let input = NewBatch {
        farm_location: args.farm_location,
        seed_type: args.seed_type,
        transplant_date: args.transplant_date,
        yield_quantity: args.yield_quantity,
        batch_state: args.batch_state,
        grower: args.grower,
        transaction_id: args.transaction_id.unwrap_or_else(new_transaction_id),
        timestamp: args.timestamp.unwrap_or_else(now),
    };
    let batch = contract.create_batch(input)?;
    render(format, &batch, || {
        format!("{} Created {}", "✓".green().bold(), describe_batch(&batch))
    })
}

fn cmd_create_product(
    contract: &Contract,
    args: CreateProductArgs,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let transaction_id = args.transaction_id.unwrap_or_else(new_transaction_id);
    let product = contract.create_product(&args.product_id, &args.batch_id, &transaction_id)?;
    render(format, &product, || {
        format!("{} Created {}", "✓".green().bold(), describe_product(&product))
    })
}

fn cmd_lab_result(
    contract: &Contract,
    args: LabResultArgs,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let result = LabResult {
        lab: args.lab,
        lab_id: args.lab_id,
        sampling_date: args.sampling_date,
        test_id: args.test_id,
        strain: args.strain,
        cannabinoid_content: args.cannabinoid_content,
    };
    let batch = contract.record_lab_result(&result, &event_stamp(args.stamp))?;
    render_merge(&batch, "lab result", format)
}

fn cmd_packing_list(
    contract: &Contract,
    args: PackingListArgs,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let list = PackingList {
        grower: args.grower,
        trader: args.trader,
        invoice_no: args.invoice_no,
        issue_date: args.issue_date,
        ico_no: args.ico_no,
        ico_lot: args.ico_lot,
        fda_no: args.fda_no,
        bill_of_lading_no: args.bill_of_lading_no,
        loaded_vessel: args.loaded_vessel,
        vessel_voyage_no: args.vessel_voyage_no,
        container_no: args.container_no,
        seal_no: args.seal_no,
        pl_timestamp: args.pl_timestamp,
    };
    let batch = contract.record_packing_list(&list, &event_stamp(args.stamp))?;
    render_merge(&batch, "packing list", format)
}

fn cmd_weight_tally(
    contract: &Contract,
    args: WeightTallyArgs,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let tally = WeightTally {
        date_stripped: args.date_stripped,
        marks: args.marks,
        bags_expected: args.bags_expected,
        condition: args.condition,
        insect_activity: args.insect_activity,
    };
    let batch = contract.record_weight_tally(&tally, &event_stamp(args.stamp))?;
    render_merge(&batch, "weight tally", format)
}

fn cmd_get(contract: &Contract, args: KeyArgs, format: OutputFormat) -> anyhow::Result<String> {
    let record = contract.get_record(&args.key)?;
    render(format, &record, || match &record {
        Record::Member(m) => describe_member(m),
        Record::Batch(b) => describe_batch(b),
        Record::Product(p) => describe_product(p),
    })
}

fn cmd_delete(contract: &Contract, args: KeyArgs, format: OutputFormat) -> anyhow::Result<String> {
    match contract.delete_record(&args.key) {
        Ok(()) => render(format, &json!({"deleted": args.key}), || {
            format!("{} Deleted {}", "✓".green().bold(), args.key.yellow())
        }),
        Err(ContractError::NotFound(key)) => {
            anyhow::bail!("nothing to delete: {key} does not exist")
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_compact(contract: &Contract, format: OutputFormat) -> anyhow::Result<String> {
    let store = contract.store();
    let before = store.journal_len()?;
    let records = store.compact().context("journal compaction failed")?;
    let after = store.journal_len()?;
    render(
        format,
        &json!({"records": records, "bytes_before": before, "bytes_after": after}),
        || {
            format!(
                "{} Compacted journal: {} records, {} -> {} bytes",
                "✓".green().bold(),
                records,
                before,
                after
            )
        },
    )
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render<T: Serialize>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce() -> String,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Text => Ok(text()),
    }
}

fn render_merge(batch: &Batch, event: &str, format: OutputFormat) -> anyhow::Result<String> {
    render(format, batch, || {
        format!(
            "{} Recorded {} on {}",
            "✓".green().bold(),
            event,
            describe_batch(batch)
        )
    })
}

fn render_results(results: &QueryResults, format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return Ok(results.to_json_pretty()?);
    }
    let mut lines = Vec::with_capacity(results.len() + 1);
    for hit in results {
        let body = match &hit.record {
            RecordPayload::Document(doc) => doc.to_string(),
            RecordPayload::Raw(text) => format!("{} {}", "(raw)".dimmed(), text),
        };
        lines.push(format!("{}  {}", hit.key.yellow().bold(), body));
    }
    lines.push(format!("{} records", results.len().to_string().bold()));
    Ok(lines.join("\n"))
}

fn describe_member(m: &Member) -> String {
    format!(
        "member {} ({}, {})",
        m.id.yellow().bold(),
        m.organization,
        m.member_type.cyan()
    )
}

fn describe_batch(b: &Batch) -> String {
    let mut out = format!(
        "batch {} [{}] grown by {} at {}",
        b.batch_id.yellow().bold(),
        b.batch_state.cyan(),
        b.grower,
        b.farm_location
    );
    if let Some(lab) = b.lab_result() {
        out.push_str(&format!("\n  Lab: {} test {} ({})", lab.lab, lab.test_id, lab.cannabinoid_content));
    }
    if let Some(list) = b.packing_list() {
        out.push_str(&format!(
            "\n  Shipped: {} via {} container {}",
            list.trader, list.loaded_vessel, list.container_no
        ));
    }
    if let Some(tally) = b.weight_tally() {
        out.push_str(&format!(
            "\n  Tally: {} bags expected, condition {}",
            tally.bags_expected, tally.condition
        ));
    }
    out.push_str(&format!("\n  Last transaction: {} at {}", b.transaction_id.dimmed(), b.timestamp));
    out
}

fn describe_product(p: &Product) -> String {
    let mut out = format!(
        "product {} ({}) from batch {}",
        p.product_id.yellow().bold(),
        p.product_type.to_string().cyan(),
        p.batch_id
    );
    if let Some(bean) = &p.bean_type {
        out.push_str(&format!(", {bean}"));
    }
    out
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn event_stamp(args: StampArgs) -> EventStamp {
    EventStamp::new(
        args.batch_id,
        args.transaction_id.unwrap_or_else(new_transaction_id),
        args.timestamp.unwrap_or_else(now),
    )
}

fn new_transaction_id() -> String {
    Uuid::now_v7().to_string()
}

fn now() -> String {
    SystemClock.now_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::Value;

    fn setup() -> (tempfile::TempDir, CliConfig) {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig {
            store_path: dir.path().join("htl.journal"),
            ..CliConfig::default()
        };
        (dir, config)
    }

    fn run(config: &CliConfig, args: &[&str]) -> anyhow::Result<Value> {
        let mut argv = vec!["htl", "--format", "json"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv)?;
        let out = execute(cli.command, config, cli.format)?;
        Ok(serde_json::from_str(&out)?)
    }

    fn plant(config: &CliConfig) -> String {
        let batch = run(
            config,
            &[
                "create-batch",
                "--farm-location",
                "Field 7",
                "--seed-type",
                "Cherry Wine",
                "--transplant-date",
                "2024-04-01",
                "--yield-quantity",
                "500",
                "--grower",
                "M1",
                "--transaction-id",
                "T0",
            ],
        )
        .unwrap();
        batch["batchId"].as_str().unwrap().to_string()
    }

    #[test]
    fn register_then_get_member() {
        let (_dir, config) = setup();
        let member = run(
            &config,
            &["register-member", "M1", "--organization", "AcmeFarms", "--type", "Grower"],
        )
        .unwrap();
        assert_eq!(member["organization"], "AcmeFarms");

        let read = run(&config, &["get", "M1"]).unwrap();
        assert_eq!(read, member);
    }

    #[test]
    fn batch_lifecycle_persists_across_invocations() {
        let (_dir, config) = setup();
        let batch_id = plant(&config);
        assert_eq!(batch_id.len(), 10);

        let merged = run(
            &config,
            &[
                "lab-result",
                batch_id.as_str(),
                "--transaction-id",
                "T1",
                "--lab",
                "GreenLab",
                "--lab-id",
                "L-9",
                "--sampling-date",
                "2024-05-01",
                "--test-id",
                "TST-1",
                "--strain",
                "Cherry Wine",
                "--cannabinoid-content",
                "12.4%",
            ],
        )
        .unwrap();
        assert_eq!(merged["lab"], "GreenLab");
        assert_eq!(merged["transactionId"], "T1");
        assert_eq!(merged["farmLocation"], "Field 7");

        let product = run(&config, &["create-product", "bX123", "--batch", batch_id.as_str()]).unwrap();
        assert_eq!(product["productType"], "Broad-spectrum");

        let all = run(&config, &["list"]).unwrap();
        assert_eq!(all.as_array().unwrap().len(), 2);

        let by_lab = run(&config, &["query", r#"{"selector":{"lab":"GreenLab"}}"#]).unwrap();
        assert_eq!(by_lab[0]["Key"], batch_id.as_str());
        assert_eq!(by_lab[0]["Record"]["testId"], "TST-1");
    }

    #[test]
    fn text_output_names_the_bean_type() {
        let (_dir, config) = setup();
        let batch_id = plant(&config);
        let cli = Cli::try_parse_from(["htl", "create-product", "bB7", "--batch", batch_id.as_str()])
            .unwrap();
        let out = execute(cli.command, &config, OutputFormat::Text).unwrap();
        assert!(out.contains("bB7"));
        assert!(out.contains(", Ethiopian Natural Yirgacheffe"));
    }

    #[test]
    fn product_for_missing_batch_fails() {
        let (_dir, config) = setup();
        let err = run(&config, &["create-product", "bX123", "--batch", "B404"]).unwrap_err();
        assert!(err.to_string().contains("B404 batch does not exist"));
        assert_eq!(run(&config, &["list"]).unwrap(), serde_json::json!([]));
    }

    #[test]
    fn delete_reports_missing_keys() {
        let (_dir, config) = setup();
        run(
            &config,
            &["register-member", "M1", "--organization", "AcmeFarms", "--type", "Grower"],
        )
        .unwrap();
        let deleted = run(&config, &["delete", "M1"]).unwrap();
        assert_eq!(deleted["deleted"], "M1");

        let err = run(&config, &["delete", "M1"]).unwrap_err();
        assert!(err.to_string().contains("nothing to delete"));
    }

    #[test]
    fn compact_keeps_live_records() {
        let (_dir, config) = setup();
        for org in ["A", "B", "C"] {
            run(
                &config,
                &["register-member", "M1", "--organization", org, "--type", "Grower"],
            )
            .unwrap();
        }
        let report = run(&config, &["compact"]).unwrap();
        assert_eq!(report["records"], 1);
        assert!(report["bytes_after"].as_u64() < report["bytes_before"].as_u64());

        let read = run(&config, &["get", "M1"]).unwrap();
        assert_eq!(read["organization"], "C");
    }

    #[test]
    fn text_output_mentions_the_record() {
        let (_dir, config) = setup();
        let cli = Cli::try_parse_from([
            "htl", "register-member", "M1", "--organization", "AcmeFarms", "--type", "Grower",
        ])
        .unwrap();
        let out = execute(cli.command, &config, cli.format).unwrap();
        assert!(out.contains("M1"));
        assert!(out.contains("AcmeFarms"));

        let cli = Cli::try_parse_from(["htl", "list"]).unwrap();
        let out = execute(cli.command, &config, cli.format).unwrap();
        assert!(out.contains("records"));
    }

    #[test]
    fn malformed_selector_is_reported() {
        let (_dir, config) = setup();
        let err = run(&config, &["query", "{oops"]).unwrap_err();
        assert!(err.to_string().contains("validation failed"));
    }
}
