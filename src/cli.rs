//! `tender` command-line surface.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use tender::config::Config;
use tender::constants::{DEFAULT_TOP_K, PROFILE_SNAPSHOT_NAME, RETRIEVAL_SNAPSHOT_NAME};
use tender::data::{self, Cleaner};
use tender::models::{
    ModelError, PriceRegressor, RetrievalIndex, TrainConfig, TwoTowerModel, WinnerClassifier,
    select_device, train_holdout_split,
};
use tender::profile::ProfileIndex;
use tender::ranking::{LotQuery, RankingConfig, SupplierRanker, evaluate_hit_rate};
use tender::storage::SnapshotStore;

const INTERACTIONS_FILE: &str = "interactions.csv";
const PREPARE_REPORT_FILE: &str = "prepare_report.json";
const CLASSIFIER_FILE: &str = "classifier.safetensors";
const REGRESSOR_FILE: &str = "regressor.safetensors";
const TWO_TOWER_DIR: &str = "two_tower";

#[derive(Parser, Debug)]
#[command(name = "tender")]
#[command(version)]
#[command(about = "Supplier recommendation for public procurement lots", long_about = None)]
pub struct Cli {
    /// Artifacts directory (overrides TENDER_ARTIFACTS_DIR)
    #[arg(long, global = true)]
    pub artifacts_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clean and merge the raw exports into interactions.csv
    Prepare {
        /// Bare file names resolve against TENDER_DATA_DIR
        #[arg(long)]
        tenders: PathBuf,
        #[arg(long)]
        lots: PathBuf,
        #[arg(long)]
        participants: PathBuf,
        /// Output directory
        #[arg(long)]
        out: PathBuf,
    },
    /// Build or extend the supplier profile snapshot
    Index {
        #[arg(long)]
        interactions: PathBuf,
        /// Snapshot name inside the artifacts directory
        #[arg(long, default_value = PROFILE_SNAPSHOT_NAME)]
        snapshot: String,
    },
    /// Rank suppliers for one lot and print JSON
    Rank {
        #[arg(long)]
        okpd2: Option<String>,
        #[arg(long)]
        ktru: Option<String>,
        #[arg(long)]
        region: Option<String>,
        /// Lot start price
        #[arg(long)]
        price: Option<f64>,
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        /// Suppliers to leave out (comma separated)
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
        #[arg(long, default_value = PROFILE_SNAPSHOT_NAME)]
        snapshot: String,
    },
    /// Hit rate of the heuristic ranker on a lot-level holdout
    Evaluate {
        #[arg(long)]
        interactions: PathBuf,
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        k: usize,
    },
    /// Train a model, print holdout metrics and save its artifacts
    Train {
        #[arg(value_enum)]
        model: TrainTarget,
        #[arg(long)]
        interactions: PathBuf,
        /// Cutoff for recall@k
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        k: usize,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrainTarget {
    Classifier,
    Regressor,
    TwoTower,
    Retrieval,
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env().context("invalid TENDER_* configuration")?;
    if let Some(dir) = cli.artifacts_dir {
        config.artifacts_dir = dir;
    }
    config.validate()?;

    match cli.command {
        Commands::Prepare {
            tenders,
            lots,
            participants,
            out,
        } => prepare(&config, &tenders, &lots, &participants, &out),
        Commands::Index {
            interactions,
            snapshot,
        } => index(&config, &interactions, &snapshot),
        Commands::Rank {
            okpd2,
            ktru,
            region,
            price,
            top_k,
            exclude,
            snapshot,
        } => {
            let query = LotQuery {
                okpd2_code: okpd2,
                ktru_code: ktru,
                region,
                start_price: price,
                top_k,
                exclude,
            };
            rank(&config, &query, &snapshot)
        }
        Commands::Evaluate { interactions, k } => evaluate(&config, &interactions, k),
        Commands::Train {
            model,
            interactions,
            k,
        } => train(&config, model, &interactions, k),
    }
}

fn prepare(
    config: &Config,
    tenders: &Path,
    lots: &Path,
    participants: &Path,
    out: &Path,
) -> anyhow::Result<()> {
    let (tenders, lots, participants) = (
        config.data_file(tenders),
        config.data_file(lots),
        config.data_file(participants),
    );
    let cleaner = Cleaner::from_config(config);
    let (interactions, report) = data::prepare(&cleaner, &tenders, &lots, &participants)
        .context("failed to prepare interactions")?;

    fs::create_dir_all(out)
        .with_context(|| format!("failed to create output directory {}", out.display()))?;
    data::write_interactions(&out.join(INTERACTIONS_FILE), &interactions)?;
    data::write_report(&out.join(PREPARE_REPORT_FILE), &report)?;

    info!(
        interactions = interactions.len(),
        out = %out.display(),
        "Prepare complete"
    );
    print_json(&report)
}

fn index(config: &Config, interactions: &Path, snapshot: &str) -> anyhow::Result<()> {
    let rows = load_interactions(interactions)?;
    let store = SnapshotStore::new(config.artifacts_dir.clone());

    let mut index = ProfileIndex::load_or_default(&store, snapshot)
        .with_context(|| format!("failed to load profile snapshot '{snapshot}'"))?;
    let report = index.ingest(&rows);
    index
        .save(&store, snapshot)
        .with_context(|| format!("failed to save profile snapshot '{snapshot}'"))?;

    print_json(&report)
}

fn rank(config: &Config, query: &LotQuery, snapshot: &str) -> anyhow::Result<()> {
    let store = SnapshotStore::new(config.artifacts_dir.clone());
    if !store.exists(snapshot) {
        bail!(
            "profile snapshot '{snapshot}' not found in {}; run `tender index` first",
            config.artifacts_dir.display()
        );
    }
    let index = ProfileIndex::load(&store, snapshot)
        .with_context(|| format!("failed to load profile snapshot '{snapshot}'"))?;

    let ranker = SupplierRanker::new(RankingConfig::from_env()?)?;
    let outcome = ranker.rank(&index, query)?;
    print_json(&outcome)
}

fn evaluate(config: &Config, interactions: &Path, k: usize) -> anyhow::Result<()> {
    let rows = load_interactions(interactions)?;
    let (train, holdout) = train_holdout_split(&rows, config.holdout_fraction);

    let ranker = SupplierRanker::new(RankingConfig::from_env()?)?;
    let report = evaluate_hit_rate(&ranker, &train, &holdout, k)?;
    print_json(&report)
}

fn train(
    config: &Config,
    target: TrainTarget,
    interactions: &Path,
    k: usize,
) -> anyhow::Result<()> {
    let train_config = TrainConfig::from_env()?;
    let rows = load_interactions(interactions)?;
    let (train, holdout) = train_holdout_split(&rows, train_config.holdout_fraction);
    let device = select_device();

    fs::create_dir_all(&config.artifacts_dir).with_context(|| {
        format!(
            "failed to create artifacts directory {}",
            config.artifacts_dir.display()
        )
    })?;

    match target {
        TrainTarget::Classifier => {
            let index = ProfileIndex::build(&train);
            let model = WinnerClassifier::fit(&train, &index, &train_config, &device)
                .context("failed to train winner classifier")?;
            let report = model.evaluate(&holdout, &index)?;
            model.save(&config.artifacts_dir.join(CLASSIFIER_FILE))?;
            print_json(&report)
        }
        TrainTarget::Regressor => {
            let model = PriceRegressor::fit(&train, &train_config, &device)
                .context("failed to train price regressor")?;
            let report = model.evaluate(&holdout)?;
            model.save(&config.artifacts_dir.join(REGRESSOR_FILE))?;
            print_json(&report)
        }
        TrainTarget::TwoTower => {
            let model = TwoTowerModel::fit(&train, &train_config, &device)
                .context("failed to train two-tower model")?;
            let report = model.evaluate(&holdout, k)?;
            model.save(&config.artifacts_dir.join(TWO_TOWER_DIR))?;
            print_json(&report)
        }
        TrainTarget::Retrieval => {
            let dir = config.artifacts_dir.join(TWO_TOWER_DIR);
            let model = match TwoTowerModel::load(&dir, &device) {
                Ok(model) => model,
                Err(ModelError::ArtifactNotFound { path }) => {
                    info!(missing = %path.display(), "No saved two-tower model, training one");
                    let model = TwoTowerModel::fit(&train, &train_config, &device)
                        .context("failed to train two-tower model")?;
                    model.save(&dir)?;
                    model
                }
                Err(err) => return Err(err).context("failed to load two-tower model"),
            };

            let index = RetrievalIndex::from_model(&model)?;
            let report = index.evaluate(&model, &holdout, k, train_config.rescore_candidates)?;
            let store = SnapshotStore::new(config.artifacts_dir.clone());
            index.save(&store, RETRIEVAL_SNAPSHOT_NAME)?;
            print_json(&report)
        }
    }
}

fn load_interactions(path: &Path) -> anyhow::Result<Vec<data::Interaction>> {
    let rows = data::load_interactions(path)
        .with_context(|| format!("failed to load interactions from {}", path.display()))?;
    if rows.is_empty() {
        bail!("{} contains no interactions", path.display());
    }
    Ok(rows)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rank() {
        let cli = Cli::try_parse_from([
            "tender",
            "rank",
            "--okpd2",
            "26.20.11",
            "--price",
            "15000",
            "--top-k",
            "3",
            "--exclude",
            "S1,S2",
        ])
        .expect("valid arguments");

        match cli.command {
            Commands::Rank {
                okpd2,
                ktru,
                price,
                top_k,
                exclude,
                snapshot,
                ..
            } => {
                assert_eq!(okpd2.as_deref(), Some("26.20.11"));
                assert!(ktru.is_none());
                assert_eq!(price, Some(15000.0));
                assert_eq!(top_k, 3);
                assert_eq!(exclude, vec!["S1", "S2"]);
                assert_eq!(snapshot, PROFILE_SNAPSHOT_NAME);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_train_target() {
        let cli = Cli::try_parse_from([
            "tender",
            "train",
            "two-tower",
            "--interactions",
            "out/interactions.csv",
            "--artifacts-dir",
            "/tmp/artifacts",
        ])
        .expect("valid arguments");

        assert_eq!(cli.artifacts_dir, Some(PathBuf::from("/tmp/artifacts")));
        match cli.command {
            Commands::Train { model, k, .. } => {
                assert_eq!(model, TrainTarget::TwoTower);
                assert_eq!(k, DEFAULT_TOP_K);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_model() {
        assert!(
            Cli::try_parse_from(["tender", "train", "forest", "--interactions", "x.csv"]).is_err()
        );
    }

    #[test]
    fn test_prepare_reads_bare_names_from_data_dir() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let data_dir = dir.path().join("exports");
        fs::create_dir_all(&data_dir).expect("data dir");
        fs::write(
            data_dir.join("tenders.csv"),
            "tender_id,customer_id,region,publish_date\nT1,C1,Moscow,2024-01-10\n",
        )
        .expect("tenders");
        fs::write(
            data_dir.join("lots.csv"),
            "pn_lot,tender_id,okpd2_code,ktru_code,start_price\nL1,T1,26.20.11,,1000\n",
        )
        .expect("lots");
        fs::write(
            data_dir.join("participants.csv"),
            "pn_lot,post_num,supplier_region,bid_price,is_winner\nL1,S1,Moscow,900,1\nL1,S2,Kazan,950,0\n",
        )
        .expect("participants");

        let config = Config {
            data_dir,
            artifacts_dir: dir.path().join("artifacts"),
            ..Default::default()
        };
        let out = dir.path().join("out");
        prepare(
            &config,
            Path::new("tenders.csv"),
            Path::new("lots.csv"),
            Path::new("participants.csv"),
            &out,
        )
        .expect("prepare succeeds");

        let rows = data::load_interactions(&out.join(INTERACTIONS_FILE)).expect("interactions");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].lot_region.as_deref(), Some("moscow"));
        assert!(out.join(PREPARE_REPORT_FILE).exists());
    }

    #[test]
    fn test_prepare_requires_all_inputs() {
        assert!(Cli::try_parse_from(["tender", "prepare", "--tenders", "t.csv"]).is_err());
    }
}
