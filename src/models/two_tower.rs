//! Two-tower lot/supplier recommender.
//!
//! The lot tower sums embeddings of the OKPD2 class, the full OKPD2 code, the region and a
//! log-price bucket, then applies a square linear projection. The supplier tower is a plain
//! embedding table. A (lot, supplier) pair scores the dot product of both towers.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{AdamW, Embedding, Init, Linear, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::PRICE_BUCKETS;
use crate::data::Interaction;
use crate::ranking::LotQuery;

use super::config::TrainConfig;
use super::error::{ModelError, ModelResult};
use super::features::{PriceBuckets, Vocabulary};
use super::metrics::recall_at_k;
use super::nn::bce_with_logits;

const WEIGHTS_FILE: &str = "two_tower.safetensors";
const VOCAB_FILE: &str = "two_tower.json";
const EMBEDDING_INIT_SCALE: f64 = 0.1;

/// Everything needed to rebuild the towers' shapes and map inputs to ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoTowerVocab {
    pub dim: usize,
    pub classes: Vocabulary,
    pub codes: Vocabulary,
    pub regions: Vocabulary,
    pub suppliers: Vocabulary,
    pub prices: PriceBuckets,
}

impl TwoTowerVocab {
    pub fn fit(train: &[Interaction], dim: usize) -> Self {
        Self {
            dim,
            classes: Vocabulary::fit(
                train
                    .iter()
                    .filter_map(|r| okpd2_class(r.okpd2_code.as_deref())),
            ),
            codes: Vocabulary::fit(train.iter().filter_map(|r| r.okpd2_code.as_deref())),
            regions: Vocabulary::fit(train.iter().filter_map(|r| r.lot_region.as_deref())),
            suppliers: Vocabulary::fit(train.iter().map(|r| r.post_num.as_str())),
            prices: PriceBuckets::fit(train.iter().filter_map(|r| r.start_price), PRICE_BUCKETS),
        }
    }

    fn lot_ids(&self, okpd2: Option<&str>, region: Option<&str>, price: Option<f64>) -> LotIds {
        LotIds {
            class: self.classes.id_of(okpd2_class(okpd2)),
            code: self.codes.id_of(okpd2),
            region: self.regions.id_of(region),
            price: self.prices.bucket(price),
        }
    }
}

fn okpd2_class(code: Option<&str>) -> Option<&str> {
    code.and_then(|c| c.split('.').next()).filter(|c| !c.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LotIds {
    class: u32,
    code: u32,
    region: u32,
    price: u32,
}

#[derive(Debug, Clone, Copy)]
struct Pair {
    lot: LotIds,
    supplier: u32,
    label: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub post_num: String,
    pub score: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TwoTowerReport {
    pub k: usize,
    pub lots_evaluated: usize,
    pub recall_at_k: f64,
}

struct LotTower {
    class: Embedding,
    code: Embedding,
    region: Embedding,
    price: Embedding,
    projection: Linear,
}

impl LotTower {
    fn forward(
        &self,
        class: &Tensor,
        code: &Tensor,
        region: &Tensor,
        price: &Tensor,
    ) -> candle_core::Result<Tensor> {
        let sum = (self.class.forward(class)? + self.code.forward(code)?)?;
        let sum = (sum + self.region.forward(region)?)?;
        let sum = (sum + self.price.forward(price)?)?;
        self.projection.forward(&sum)
    }
}

pub struct TwoTowerModel {
    vocab: TwoTowerVocab,
    lot_tower: LotTower,
    supplier_tower: Embedding,
    varmap: VarMap,
    device: Device,
}

impl std::fmt::Debug for TwoTowerModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoTowerModel")
            .field("device", &format!("{:?}", self.device))
            .field("dim", &self.vocab.dim)
            .field("suppliers", &self.vocab.suppliers.known())
            .finish()
    }
}

impl TwoTowerModel {
    /// Creates the towers for `vocab`. With a seed, weights are drawn from a seeded uniform
    /// distribution; without one they start at zero (used before loading saved weights).
    fn build(vocab: TwoTowerVocab, device: &Device, seed: Option<u64>) -> ModelResult<Self> {
        let dim = vocab.dim;
        let mut varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let table =
            |name: &str, rows: usize| vb.get_with_hints((rows, dim), name, Init::Const(0.0));

        let class = table("lot_class", vocab.classes.size())?;
        let code = table("lot_code", vocab.codes.size())?;
        let region = table("lot_region", vocab.regions.size())?;
        let price = table("lot_price", vocab.prices.size())?;
        let projection = table("lot_projection.weight", dim)?;
        let bias = vb.get_with_hints(dim, "lot_projection.bias", Init::Const(0.0))?;
        let supplier = table("supplier", vocab.suppliers.size())?;

        if let Some(seed) = seed {
            let mut rng = StdRng::seed_from_u64(seed);
            let tables = [
                ("lot_class", vocab.classes.size(), EMBEDDING_INIT_SCALE),
                ("lot_code", vocab.codes.size(), EMBEDDING_INIT_SCALE),
                ("lot_region", vocab.regions.size(), EMBEDDING_INIT_SCALE),
                ("lot_price", vocab.prices.size(), EMBEDDING_INIT_SCALE),
                ("lot_projection.weight", dim, 1.0 / (dim as f64).sqrt()),
                ("supplier", vocab.suppliers.size(), EMBEDDING_INIT_SCALE),
            ];
            for (name, rows, scale) in tables {
                let values: Vec<f32> = (0..rows * dim)
                    .map(|_| rng.gen_range(-scale..scale) as f32)
                    .collect();
                varmap.set_one(name, Tensor::from_vec(values, (rows, dim), device)?)?;
            }
        }

        Ok(Self {
            lot_tower: LotTower {
                class: Embedding::new(class, dim),
                code: Embedding::new(code, dim),
                region: Embedding::new(region, dim),
                price: Embedding::new(price, dim),
                projection: Linear::new(projection, Some(bias)),
            },
            supplier_tower: Embedding::new(supplier, dim),
            vocab,
            varmap,
            device: device.clone(),
        })
    }

    pub fn fit(train: &[Interaction], config: &TrainConfig, device: &Device) -> ModelResult<Self> {
        let winners: Vec<&Interaction> = train.iter().filter(|r| r.is_winner).collect();
        if winners.is_empty() {
            return Err(ModelError::EmptyTrainingSet {
                what: "two-tower recommender (no winners)",
            });
        }

        let vocab = TwoTowerVocab::fit(train, config.embedding_dim);
        let n_suppliers = vocab.suppliers.known() as u32;
        let model = Self::build(vocab, device, Some(config.seed))?;

        let positives: Vec<Pair> = winners
            .iter()
            .map(|r| Pair {
                lot: model.lot_ids_of(r),
                supplier: model.vocab.suppliers.id(&r.post_num),
                label: 1.0,
            })
            .collect();

        let params = ParamsAdamW {
            lr: config.learning_rate,
            ..Default::default()
        };
        let mut optimizer = AdamW::new(model.varmap.all_vars(), params)?;
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));

        for epoch in 0..config.epochs {
            let mut pairs = positives.clone();
            if n_suppliers > 1 {
                for positive in &positives {
                    for _ in 0..config.negatives {
                        let mut negative = rng.gen_range(1..=n_suppliers);
                        while negative == positive.supplier {
                            negative = rng.gen_range(1..=n_suppliers);
                        }
                        pairs.push(Pair {
                            lot: positive.lot,
                            supplier: negative,
                            label: 0.0,
                        });
                    }
                }
            }
            pairs.shuffle(&mut rng);

            let mut epoch_loss = 0.0;
            let mut steps = 0usize;
            for batch in pairs.chunks(config.batch_size.max(1)) {
                let loss = model.batch_loss(batch)?;
                optimizer.backward_step(&loss)?;
                epoch_loss += loss.to_scalar::<f32>()? as f64;
                steps += 1;
            }
            debug!(epoch, loss = epoch_loss / steps.max(1) as f64, "Two-tower epoch");
        }

        info!(
            positives = positives.len(),
            suppliers = n_suppliers,
            dim = model.vocab.dim,
            epochs = config.epochs,
            "Two-tower recommender trained"
        );

        Ok(model)
    }

    fn batch_loss(&self, batch: &[Pair]) -> ModelResult<Tensor> {
        let column = |f: fn(&Pair) -> u32| -> candle_core::Result<Tensor> {
            let ids: Vec<u32> = batch.iter().map(f).collect();
            Tensor::from_vec(ids, batch.len(), &self.device)
        };

        let lot = self.lot_tower.forward(
            &column(|p| p.lot.class)?,
            &column(|p| p.lot.code)?,
            &column(|p| p.lot.region)?,
            &column(|p| p.lot.price)?,
        )?;
        let supplier = self.supplier_tower.forward(&column(|p| p.supplier)?)?;
        let logits = (lot * supplier)?.sum(1)?;

        let labels: Vec<f32> = batch.iter().map(|p| p.label).collect();
        let labels = Tensor::from_vec(labels, batch.len(), &self.device)?;
        Ok(bce_with_logits(&logits, &labels)?)
    }

    fn lot_ids_of(&self, row: &Interaction) -> LotIds {
        self.vocab.lot_ids(
            row.okpd2_code.as_deref(),
            row.lot_region.as_deref(),
            row.start_price,
        )
    }

    pub fn vocab(&self) -> &TwoTowerVocab {
        &self.vocab
    }

    fn lot_tensor(&self, query: &LotQuery) -> ModelResult<Tensor> {
        let query = query.normalized();
        let ids = self.vocab.lot_ids(
            query.okpd2_code.as_deref(),
            query.region.as_deref(),
            query.start_price,
        );
        let one = |id: u32| Tensor::from_vec(vec![id], 1, &self.device);
        Ok(self.lot_tower.forward(
            &one(ids.class)?,
            &one(ids.code)?,
            &one(ids.region)?,
            &one(ids.price)?,
        )?)
    }

    /// Lot-tower output for `query`.
    pub fn lot_embedding(&self, query: &LotQuery) -> ModelResult<Vec<f32>> {
        Ok(self.lot_tensor(query)?.flatten_all()?.to_vec1::<f32>()?)
    }

    /// Supplier-tower embeddings of every known supplier, sorted by `post_num`.
    pub fn supplier_embeddings(&self) -> ModelResult<Vec<(String, Vec<f32>)>> {
        let rows = self.supplier_tower.embeddings().to_vec2::<f32>()?;
        Ok(rows
            .into_iter()
            .enumerate()
            .skip(1)
            .filter_map(|(id, row)| {
                self.vocab
                    .suppliers
                    .token(id as u32)
                    .map(|post_num| (post_num.to_string(), row))
            })
            .collect())
    }

    /// Scores every known supplier against `query` and returns the best `k`.
    pub fn recommend(&self, query: &LotQuery, k: usize) -> ModelResult<Vec<Recommendation>> {
        let lot = self.lot_tensor(query)?;
        let scores = self
            .supplier_tower
            .embeddings()
            .matmul(&lot.t()?.contiguous()?)?
            .flatten_all()?
            .to_vec1::<f32>()?;

        let mut ranked: Vec<Recommendation> = scores
            .into_iter()
            .enumerate()
            .skip(1)
            .filter_map(|(id, score)| {
                let post_num = self.vocab.suppliers.token(id as u32)?;
                (!query.exclude.iter().any(|e| e == post_num)).then(|| Recommendation {
                    post_num: post_num.to_string(),
                    score,
                })
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.post_num.cmp(&b.post_num))
        });
        ranked.truncate(k);
        Ok(ranked)
    }

    /// Recall@k on holdout lots whose winner is a known supplier.
    pub fn evaluate(&self, holdout: &[Interaction], k: usize) -> ModelResult<TwoTowerReport> {
        let mut winners: BTreeMap<&str, &Interaction> = BTreeMap::new();
        for row in holdout.iter().filter(|r| r.is_winner) {
            winners.entry(row.pn_lot.as_str()).or_insert(row);
        }

        let mut ranked = Vec::new();
        let mut relevant = Vec::new();
        for winner in winners.values() {
            if self.vocab.suppliers.id(&winner.post_num) == 0 {
                continue;
            }
            let recommendations = self.recommend(&LotQuery::from_interaction(winner, k), k)?;
            ranked.push(
                recommendations
                    .into_iter()
                    .map(|r| r.post_num)
                    .collect::<Vec<_>>(),
            );
            relevant.push(winner.post_num.clone());
        }

        let report = TwoTowerReport {
            k,
            lots_evaluated: relevant.len(),
            recall_at_k: recall_at_k(&ranked, &relevant, k),
        };
        info!(
            k,
            lots = report.lots_evaluated,
            recall = report.recall_at_k,
            "Two-tower evaluated"
        );
        Ok(report)
    }

    /// Writes `two_tower.safetensors` and `two_tower.json` into `dir`.
    pub fn save(&self, dir: &Path) -> ModelResult<()> {
        fs::create_dir_all(dir)?;
        self.varmap.save(dir.join(WEIGHTS_FILE))?;
        let writer = BufWriter::new(File::create(dir.join(VOCAB_FILE))?);
        serde_json::to_writer_pretty(writer, &self.vocab)?;
        debug!(dir = %dir.display(), "Two-tower model saved");
        Ok(())
    }

    pub fn load(dir: &Path, device: &Device) -> ModelResult<Self> {
        let weights = dir.join(WEIGHTS_FILE);
        let vocab_path = dir.join(VOCAB_FILE);
        for path in [&weights, &vocab_path] {
            if !path.exists() {
                return Err(ModelError::ArtifactNotFound { path: path.clone() });
            }
        }

        let vocab: TwoTowerVocab =
            serde_json::from_reader(BufReader::new(File::open(&vocab_path)?))?;
        let mut model = Self::build(vocab, device, None)?;
        model.varmap.load(&weights)?;
        debug!(dir = %dir.display(), "Two-tower model loaded");
        Ok(model)
    }
}
