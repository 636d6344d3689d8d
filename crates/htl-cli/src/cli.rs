use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "htl",
    about = "Hemp Trace Ledger: trace hemp batches from cultivation to retail",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Journal file backing the record store
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Open (or create) the store and log the contract instantiation
    Init,
    /// Register a supply-chain participant
    RegisterMember(RegisterMemberArgs),
    /// Plant a new batch
    CreateBatch(CreateBatchArgs),
    /// Derive a retail product from a batch
    CreateProduct(CreateProductArgs),
    /// Record a lab result against a batch
    LabResult(LabResultArgs),
    /// Record a packing list against a batch
    PackingList(PackingListArgs),
    /// Record a weight tally against a batch
    WeightTally(WeightTallyArgs),
    /// Show the record stored under a key
    Get(KeyArgs),
    /// Delete the record stored under a key
    Delete(KeyArgs),
    /// List every record
    List,
    /// List records matching a selector
    Query(QueryArgs),
    /// Rewrite the journal to one entry per live record
    Compact,
}

#[derive(Args)]
pub struct RegisterMemberArgs {
    pub id: String,
    #[arg(long)]
    pub organization: String,
    #[arg(long, default_value = "")]
    pub address: String,
    #[arg(long = "type")]
    pub member_type: String,
}

#[derive(Args)]
pub struct CreateBatchArgs {
    #[arg(long)]
    pub farm_location: String,
    #[arg(long)]
    pub seed_type: String,
    #[arg(long)]
    pub transplant_date: String,
    #[arg(long)]
    pub yield_quantity: String,
    #[arg(long, default_value = "planted")]
    pub batch_state: String,
    #[arg(long)]
    pub grower: String,
    #[arg(long)]
    pub transaction_id: Option<String>,
    #[arg(long)]
    pub timestamp: Option<String>,
}

#[derive(Args)]
pub struct CreateProductArgs {
    pub product_id: String,
    #[arg(long = "batch")]
    pub batch_id: String,
    #[arg(long)]
    pub transaction_id: Option<String>,
}

/// Transaction bookkeeping shared by every batch event.
#[derive(Args)]
pub struct StampArgs {
    pub batch_id: String,
    /// Defaults to a fresh UUID
    #[arg(long)]
    pub transaction_id: Option<String>,
    /// Defaults to the current time
    #[arg(long)]
    pub timestamp: Option<String>,
}

#[derive(Args)]
pub struct LabResultArgs {
    #[command(flatten)]
    pub stamp: StampArgs,
    #[arg(long)]
    pub lab: String,
    #[arg(long)]
    pub lab_id: String,
    #[arg(long)]
    pub sampling_date: String,
    #[arg(long)]
    pub test_id: String,
    #[arg(long)]
    pub strain: String,
    #[arg(long)]
    pub cannabinoid_content: String,
}

#[derive(Args)]
pub struct PackingListArgs {
    #[command(flatten)]
    pub stamp: StampArgs,
    #[arg(long)]
    pub grower: String,
    #[arg(long)]
    pub trader: String,
    #[arg(long)]
    pub invoice_no: String,
    #[arg(long)]
    pub issue_date: String,
    #[arg(long)]
    pub ico_no: String,
    #[arg(long)]
    pub ico_lot: String,
    #[arg(long)]
    pub fda_no: String,
    #[arg(long)]
    pub bill_of_lading_no: String,
    #[arg(long)]
    pub loaded_vessel: String,
    #[arg(long)]
    pub vessel_voyage_no: String,
    #[arg(long)]
    pub container_no: String,
    #[arg(long)]
    pub seal_no: String,
    #[arg(long)]
    pub pl_timestamp: String,
}

#[derive(Args)]
pub struct WeightTallyArgs {
    #[command(flatten)]
    pub stamp: StampArgs,
    #[arg(long)]
    pub date_stripped: String,
    #[arg(long)]
    pub marks: String,
    #[arg(long)]
    pub bags_expected: String,
    #[arg(long)]
    pub condition: String,
    #[arg(long)]
    pub insect_activity: String,
}

#[derive(Args)]
pub struct KeyArgs {
    pub key: String,
}

#[derive(Args)]
pub struct QueryArgs {
    /// Selector document, e.g. '{"selector":{"grower":"M1"}}'
    pub selector: String,
}
