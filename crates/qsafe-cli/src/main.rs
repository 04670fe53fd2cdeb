//! QSafe CLI
//!
//! Command-line driver for the QSafe primitives: random generation,
//! BLAKE2b hashing, post-quantum key generation, hybrid encryption and
//! signatures, and a timing harness.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use qsafe_core::{Algorithm, EntropyTier, QSafeConfig};
use qsafe_pq::{
    Dilithium, DilithiumLevel, HybridCiphertext, HybridCrypto, HybridPublicKey, HybridSecretKey, HybridSignature,
    LweCrypto, LweParams, LwePrivateKey, LwePublicKey, QuantumSafeUtils, SphincsParams, SphincsPlus,
};
use qsafe_random::Csprng;
use qsafe_symmetric::blake2b;

#[derive(Parser)]
#[command(name = "qsafe")]
#[command(version = "0.1.0")]
#[command(about = "QSafe - classical and post-quantum cryptography toolkit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "qsafe.toml")]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate random values
    Random {
        #[arg(value_enum, default_value = "hex")]
        kind: RandomKind,

        /// Byte length (or string length for `string`)
        #[arg(short, long, default_value = "32")]
        length: usize,

        /// Lower bound for `int` (inclusive)
        #[arg(long, default_value = "0")]
        min: i64,

        /// Upper bound for `int` (exclusive)
        #[arg(long, default_value = "100")]
        max: i64,
    },

    /// BLAKE2b digest of a file, an argument or stdin
    Hash {
        /// Text to hash (reads stdin when neither text nor --file is given)
        text: Option<String>,

        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Digest length in bytes
        #[arg(short, long, default_value = "32")]
        length: usize,

        /// MAC key (hex)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Generate a key pair
    Keygen {
        #[arg(value_enum)]
        algorithm: KeyAlgorithm,

        /// Output directory for `<algorithm>.pub` and `<algorithm>.key`
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Encrypt a file to a public key
    Encrypt {
        #[arg(value_enum, default_value = "hybrid")]
        algorithm: CipherAlgorithm,

        /// Recipient public key file
        #[arg(short, long)]
        key: PathBuf,

        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Decrypt a file with a secret key
    Decrypt {
        #[arg(value_enum, default_value = "hybrid")]
        algorithm: CipherAlgorithm,

        /// Secret key file
        #[arg(short, long)]
        key: PathBuf,

        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Sign a file
    Sign {
        #[arg(value_enum)]
        algorithm: SignAlgorithm,

        /// Secret key file
        #[arg(short, long)]
        key: PathBuf,

        #[arg(short, long)]
        input: PathBuf,

        /// Signature output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Verify a file signature
    Verify {
        #[arg(value_enum)]
        algorithm: SignAlgorithm,

        /// Public key file
        #[arg(short, long)]
        key: PathBuf,

        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        signature: PathBuf,
    },

    /// Time the post-quantum families
    Bench {
        #[arg(short, long, default_value = "5")]
        iterations: u32,
    },

    /// Show algorithms, security levels and sizes
    Info,
}

#[derive(Clone, Copy, ValueEnum)]
enum RandomKind {
    Bytes,
    Hex,
    Base64,
    Token,
    Uuid,
    String,
    Int,
}

#[derive(Clone, Copy, ValueEnum)]
enum KeyAlgorithm {
    Lwe,
    Sphincs,
    Dilithium,
    Hybrid,
}

#[derive(Clone, Copy, ValueEnum)]
enum CipherAlgorithm {
    Lwe,
    Hybrid,
}

#[derive(Clone, Copy, ValueEnum)]
enum SignAlgorithm {
    Sphincs,
    Dilithium,
    Hybrid,
}

impl KeyAlgorithm {
    fn file_stem(&self) -> &'static str {
        match self {
            Self::Lwe => "lwe",
            Self::Sphincs => "sphincs",
            Self::Dilithium => "dilithium",
            Self::Hybrid => "hybrid",
        }
    }
}

fn init_logging(verbose: bool, json: bool, default_level: &str) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(path: &Path) -> anyhow::Result<QSafeConfig> {
    if path.exists() {
        QSafeConfig::load(path).with_context(|| format!("loading {}", path.display()))
    } else {
        Ok(QSafeConfig::default())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_logging(cli.verbose, config.logging.json, &config.logging.level);
    run(cli.command, &config)
}

fn run(command: Commands, config: &QSafeConfig) -> anyhow::Result<()> {
    let (rng, tier) = Csprng::new(config.csprng.clone())?;
    if tier == EntropyTier::Fallback {
        tracing::warn!("operating system entropy unavailable; output is not suitable for keys");
    }

    match command {
        Commands::Random { kind, length, min, max } => {
            let value = match kind {
                RandomKind::Bytes => format!("{:?}", rng.random_bytes(length)?),
                RandomKind::Hex => rng.random_hex(length)?,
                RandomKind::Base64 => rng.random_base64(length)?,
                RandomKind::Token => rng.random_token(length)?,
                RandomKind::Uuid => rng.random_uuid()?.to_string(),
                RandomKind::String => rng.random_string(length, None)?,
                RandomKind::Int => rng.random_int(min, max)?.to_string(),
            };
            println!("{}", value);
        }

        Commands::Hash { text, file, length, key } => {
            let data = match (text, file) {
                (Some(text), _) => text.into_bytes(),
                (None, Some(path)) => read_file(&path)?,
                (None, None) => {
                    let mut buf = Vec::new();
                    std::io::stdin().read_to_end(&mut buf)?;
                    buf
                }
            };
            let key = key.map(hex::decode).transpose().context("MAC key must be hex")?;
            let digest = blake2b(&data, length, key.as_deref())?;
            println!("{}", hex::encode(digest));
        }

        Commands::Keygen { algorithm, output } => {
            std::fs::create_dir_all(&output)?;
            tracing::info!(algorithm = algorithm.file_stem(), "generating key pair");

            let (public, secret) = match algorithm {
                KeyAlgorithm::Lwe => {
                    let keys = lwe(config)?.generate_key_pair(&rng)?;
                    (keys.public.to_bytes(), keys.private.to_bytes())
                }
                KeyAlgorithm::Sphincs => {
                    let keys = sphincs(config)?.generate_key_pair(&rng)?;
                    (keys.public_key, keys.private_key.to_vec())
                }
                KeyAlgorithm::Dilithium => {
                    let keys = Dilithium::from_config(&config.dilithium)?.generate_key_pair(&rng)?;
                    (keys.public_key, keys.private_key.to_vec())
                }
                KeyAlgorithm::Hybrid => {
                    let keys = HybridCrypto::from_config(config)?.generate_key_pair(&rng)?;
                    (keys.public.to_bytes(), keys.secret.to_bytes().to_vec())
                }
            };

            let pub_path = output.join(format!("{}.pub", algorithm.file_stem()));
            let key_path = output.join(format!("{}.key", algorithm.file_stem()));
            std::fs::write(&pub_path, &public)?;
            std::fs::write(&key_path, &secret)?;

            println!("Key pair generated");
            println!("Fingerprint: {}", hex::encode(&qsafe_symmetric::blake2b_256(&[&public])[..8]));
            println!("Public key: {} ({} bytes)", pub_path.display(), public.len());
            println!("Secret key: {} ({} bytes)", key_path.display(), secret.len());
        }

        Commands::Encrypt {
            algorithm,
            key,
            input,
            output,
        } => {
            let plaintext = read_file(&input)?;
            let ciphertext = match algorithm {
                CipherAlgorithm::Lwe => {
                    let lwe = lwe(config)?;
                    let public = LwePublicKey::from_bytes(&read_file(&key)?, lwe.params())?;
                    lwe.encrypt(&plaintext, &public, &rng)?
                }
                CipherAlgorithm::Hybrid => {
                    let public = HybridPublicKey::from_bytes(&read_file(&key)?)?;
                    HybridCrypto::from_config(config)?
                        .encrypt(&plaintext, &public, &rng)?
                        .to_bytes()
                }
            };
            std::fs::write(&output, &ciphertext)?;
            println!("Encrypted {} bytes into {} bytes", plaintext.len(), ciphertext.len());
        }

        Commands::Decrypt {
            algorithm,
            key,
            input,
            output,
        } => {
            let ciphertext = read_file(&input)?;
            let plaintext = match algorithm {
                CipherAlgorithm::Lwe => {
                    let lwe = lwe(config)?;
                    let private = LwePrivateKey::from_bytes(&read_file(&key)?, lwe.params())?;
                    lwe.decrypt(&ciphertext, &private)?
                }
                CipherAlgorithm::Hybrid => {
                    let secret = HybridSecretKey::from_bytes(&read_file(&key)?)?;
                    let ciphertext = HybridCiphertext::from_bytes(&ciphertext)?;
                    match HybridCrypto::from_config(config)?.decrypt(&ciphertext, &secret)? {
                        Some(plaintext) => plaintext,
                        None => bail!("decryption failed: ciphertext or key does not authenticate"),
                    }
                }
            };
            std::fs::write(&output, &plaintext)?;
            println!("Decrypted {} bytes", plaintext.len());
        }

        Commands::Sign {
            algorithm,
            key,
            input,
            output,
        } => {
            let message = read_file(&input)?;
            let secret = read_file(&key)?;
            let signature = match algorithm {
                SignAlgorithm::Sphincs => sphincs(config)?.sign(&message, &secret)?.into_bytes(),
                SignAlgorithm::Dilithium => {
                    let level = DilithiumLevel::from_private_key_size(secret.len())
                        .context("secret key length matches no Dilithium level")?;
                    Dilithium::new(level).sign(&message, &secret, &rng)?
                }
                SignAlgorithm::Hybrid => {
                    let secret = HybridSecretKey::from_bytes(&secret)?;
                    let signature = HybridCrypto::from_config(config)?.sign(&message, &secret, &rng)?;
                    serde_json::to_vec(&signature)?
                }
            };
            std::fs::write(&output, &signature)?;
            println!("Signature written to {} ({} bytes)", output.display(), signature.len());
        }

        Commands::Verify {
            algorithm,
            key,
            input,
            signature,
        } => {
            let message = read_file(&input)?;
            let public = read_file(&key)?;
            let signature = read_file(&signature)?;
            let valid = match algorithm {
                SignAlgorithm::Sphincs => sphincs(config)?.verify(&message, &signature, &public),
                SignAlgorithm::Dilithium => match DilithiumLevel::from_public_key_size(public.len()) {
                    Some(level) => Dilithium::new(level).verify(&message, &signature, &public),
                    None => false,
                },
                SignAlgorithm::Hybrid => {
                    let public = HybridPublicKey::from_bytes(&public)?;
                    let signature: HybridSignature =
                        serde_json::from_slice(&signature).context("malformed hybrid signature")?;
                    HybridCrypto::from_config(config)?.verify(&message, &signature, &public)
                }
            };
            if !valid {
                bail!("signature is NOT valid");
            }
            println!("Signature is valid");
        }

        Commands::Bench { iterations } => {
            let utils = QuantumSafeUtils::from_config(config)?;
            tracing::info!(iterations, "running benchmark");
            print!("{}", utils.benchmark(iterations, &rng)?);
        }

        Commands::Info => {
            let utils = QuantumSafeUtils::from_config(config)?;
            println!("QSafe v0.1.0");
            println!("Entropy: {}", tier);
            println!(
                "LWE: n={} q={} sigma={}  SPHINCS+: n={} w={} h={}  Dilithium: level {}",
                config.lwe.n,
                config.lwe.q,
                config.lwe.sigma,
                config.sphincs.n,
                config.sphincs.w,
                config.sphincs.h,
                config.dilithium.level
            );
            println!();
            println!(
                "{:<18} {:>6} {:>4} {:>10} {:>10} {:>10}",
                "algorithm", "level", "pq", "public", "secret", "signature"
            );
            for algorithm in Algorithm::ALL {
                let sizes = utils.key_sizes(algorithm);
                println!(
                    "{:<18} {:>6} {:>4} {:>10} {:>10} {:>10}",
                    algorithm.to_string(),
                    utils.security_level(algorithm).category(),
                    if algorithm.is_post_quantum() { "yes" } else { "no" },
                    size_cell(sizes.public_key),
                    sizes.secret_key,
                    size_cell(sizes.signature)
                );
            }
        }
    }

    Ok(())
}

fn lwe(config: &QSafeConfig) -> anyhow::Result<LweCrypto> {
    Ok(LweCrypto::new(LweParams::from_config(&config.lwe)?)?)
}

fn sphincs(config: &QSafeConfig) -> anyhow::Result<SphincsPlus> {
    Ok(SphincsPlus::new(SphincsParams::from_config(&config.sphincs)?)?)
}

fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn size_cell(size: Option<usize>) -> String {
    size.map_or_else(|| "-".to_string(), |s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn small_config() -> QSafeConfig {
        QSafeConfig::from_toml_str("[lwe]\nn = 64\n\n[dilithium]\nlevel = 2\n").unwrap()
    }

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(std::iter::once("qsafe").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, QSafeConfig::default());
    }

    #[test]
    fn test_hybrid_encrypt_decrypt_files() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path().to_str().unwrap();
        let config = small_config();

        run(parse(&["keygen", "hybrid", "-o", d]), &config).unwrap();
        std::fs::write(dir.path().join("msg.txt"), b"file payload").unwrap();

        let pub_key = format!("{}/hybrid.pub", d);
        let sec_key = format!("{}/hybrid.key", d);
        let msg = format!("{}/msg.txt", d);
        let enc = format!("{}/msg.enc", d);
        let dec = format!("{}/msg.dec", d);

        run(parse(&["encrypt", "-k", &pub_key, "-i", &msg, "-o", &enc]), &config).unwrap();
        run(parse(&["decrypt", "-k", &sec_key, "-i", &enc, "-o", &dec]), &config).unwrap();
        assert_eq!(std::fs::read(&dec).unwrap(), b"file payload");
    }

    #[test]
    fn test_dilithium_sign_verify_files() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path().to_str().unwrap();
        let config = small_config();

        run(parse(&["keygen", "dilithium", "-o", d]), &config).unwrap();
        std::fs::write(dir.path().join("doc"), b"contract").unwrap();

        let doc = format!("{}/doc", d);
        let sig = format!("{}/doc.sig", d);
        let pub_key = format!("{}/dilithium.pub", d);
        let sec_key = format!("{}/dilithium.key", d);

        run(parse(&["sign", "dilithium", "-k", &sec_key, "-i", &doc, "-o", &sig]), &config).unwrap();
        run(parse(&["verify", "dilithium", "-k", &pub_key, "-i", &doc, "-s", &sig]), &config).unwrap();

        std::fs::write(dir.path().join("doc"), b"contracT").unwrap();
        assert!(run(parse(&["verify", "dilithium", "-k", &pub_key, "-i", &doc, "-s", &sig]), &config).is_err());
    }

    #[test]
    fn test_hash_and_random() {
        let config = small_config();
        run(parse(&["hash", "abc", "--length", "64"]), &config).unwrap();
        assert!(run(parse(&["hash", "abc", "--length", "65"]), &config).is_err());
        run(parse(&["random", "int", "--min", "5", "--max", "6"]), &config).unwrap();
        run(parse(&["random", "uuid"]), &config).unwrap();
    }
}
