//! # galaxia
//!
//! Variational-autoencoder training for galaxy image reconstruction from
//! noisy, PSF-blurred observations.
//!
//! The crate couples a learned latent encoding to a physically-motivated
//! forward observation model: decoded images are convolved with the known
//! point-spread function and scored under a pixel- or Fourier-domain noise
//! likelihood. Around that objective sit a scheduled optimizer family, a
//! step-synchronous training loop with best-checkpoint selection, and an
//! atomic SafeTensors checkpoint registry keyed by run identity.
//!
//! Encoder/decoder architectures and dataset storage are external
//! collaborators behind the [`arch::Autoencoder`] and [`data::Dataset`] seams.
//!
//! ## Example
//!
//! ```no_run
//! use galaxia::arch::{Activation, LinearAutoencoder};
//! use galaxia::data::{synthetic_batches, InMemoryDataset};
//! use galaxia::rng::PrngKey;
//! use galaxia::train::{NullSink, TrainConfig, Trainer};
//!
//! let key = PrngKey::from_seed(42);
//! let train = synthetic_batches(key, 8, 16, 32, 0.02).unwrap();
//! let eval = synthetic_batches(PrngKey::from_seed(7), 2, 16, 32, 0.02).unwrap();
//! let dataset = InMemoryDataset::new(train, eval, key).unwrap();
//!
//! let config = TrainConfig::default().with_total_steps(500);
//! let arch = LinearAutoencoder::new(Activation::Gelu);
//! let mut trainer = Trainer::new(arch, dataset, config, Box::new(NullSink)).unwrap();
//! let report = trainer.fit().unwrap();
//! println!("best step: {}", report.best_step_loss);
//! ```

pub mod arch;
pub mod checkpoint;
pub mod cli;
pub mod data;
mod error;
pub mod forward;
pub mod fourier;
pub mod likelihood;
pub mod objective;
pub mod optim;
pub mod params;
pub mod rng;
pub mod train;

pub use error::{Error, Result};
pub use params::{ModelParams, ParamTree};
