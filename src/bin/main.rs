//! autosvm Command Line Interface
//!
//! Train SVM models (optionally with cross-validated grid search), inspect
//! saved models and predict with them over LibSVM and CSV data files.

use autosvm::gateway::{GatewayConfig, SharedSvm, TrainingGateway};
use autosvm::persistence::SerializableModel;
use autosvm::{
    CrossValidationConfig, CsvReader, KernelType, LibSvmReader, PredictFlags, Result, SVMError,
    StatModel, Svm, SvmParams, SvmType, TermCriteria, TrainData, TrainFlags,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info, warn};
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "autosvm")]
#[command(about = "Support Vector Machine training with cross-validated grid search")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model with fixed hyperparameters
    Train(TrainArgs),
    /// Pick hyperparameters by k-fold grid search, then train
    TrainAuto(TrainAutoArgs),
    /// Make predictions using a trained model
    Predict(PredictArgs),
    /// Report the error of a model on labelled data
    Evaluate(EvaluateArgs),
    /// Display model information
    Info(InfoArgs),
}

#[derive(Args)]
struct DataArgs {
    /// Data file (LibSVM or CSV format)
    #[arg(long)]
    data: PathBuf,

    /// Data format: auto, libsvm, or csv
    #[arg(short, long, default_value = "auto")]
    format: String,
}

#[derive(Args)]
struct ModelArgs {
    /// SVM formulation
    #[arg(long = "type", default_value = "c-svc")]
    svm_type: CliSvmType,

    /// Kernel function
    #[arg(short, long, default_value = "rbf")]
    kernel: CliKernelType,

    /// Regularization parameter C
    #[arg(short = 'C', long, default_value = "1.0")]
    c: f64,

    /// Kernel width
    #[arg(short, long, default_value = "1.0")]
    gamma: f64,

    /// Independent kernel term
    #[arg(long, default_value = "0.0")]
    coef0: f64,

    /// Polynomial degree
    #[arg(long, default_value = "3.0")]
    degree: f64,

    /// nu for NU_SVC, ONE_CLASS and NU_SVR
    #[arg(long, default_value = "0.5")]
    nu: f64,

    /// Epsilon-tube width for EPS_SVR
    #[arg(short, long, default_value = "0.1")]
    p: f64,

    /// Convergence tolerance
    #[arg(short, long, default_value = "0.001")]
    epsilon: f64,

    /// Maximum iterations
    #[arg(short, long, default_value = "100000")]
    max_iterations: usize,

    /// Kernel cache size in MB
    #[arg(long, default_value = "100")]
    cache_size: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliSvmType {
    #[value(name = "c-svc")]
    CSvc,
    #[value(name = "nu-svc")]
    NuSvc,
    #[value(name = "one-class")]
    OneClass,
    #[value(name = "eps-svr")]
    EpsSvr,
    #[value(name = "nu-svr")]
    NuSvr,
}

impl From<CliSvmType> for SvmType {
    fn from(cli: CliSvmType) -> Self {
        match cli {
            CliSvmType::CSvc => SvmType::CSvc,
            CliSvmType::NuSvc => SvmType::NuSvc,
            CliSvmType::OneClass => SvmType::OneClass,
            CliSvmType::EpsSvr => SvmType::EpsSvr,
            CliSvmType::NuSvr => SvmType::NuSvr,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliKernelType {
    Linear,
    Poly,
    Rbf,
    Sigmoid,
    Chi2,
    Inter,
}

impl From<CliKernelType> for KernelType {
    fn from(cli: CliKernelType) -> Self {
        match cli {
            CliKernelType::Linear => KernelType::Linear,
            CliKernelType::Poly => KernelType::Poly,
            CliKernelType::Rbf => KernelType::Rbf,
            CliKernelType::Sigmoid => KernelType::Sigmoid,
            CliKernelType::Chi2 => KernelType::Chi2,
            CliKernelType::Inter => KernelType::Inter,
        }
    }
}

impl ModelArgs {
    fn build(&self) -> Result<Svm> {
        let params = SvmParams {
            svm_type: self.svm_type.into(),
            kernel_type: self.kernel.into(),
            c: self.c,
            coef0: self.coef0,
            degree: self.degree,
            gamma: self.gamma,
            nu: self.nu,
            p: self.p,
            class_weights: None,
            term_criteria: TermCriteria {
                max_iter: self.max_iterations,
                epsilon: self.epsilon,
            },
        };
        params.validate()?;
        Ok(Svm::with_params(params).with_cache_size(self.cache_size * 1024 * 1024))
    }
}

#[derive(Args)]
struct TrainArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Output model file
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    model: ModelArgs,

    /// Fraction of rows used for training; the rest is reported as test error
    #[arg(long)]
    train_ratio: Option<f64>,
}

#[derive(Args)]
struct TrainAutoArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Output model file
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    model: ModelArgs,

    /// Number of cross-validation folds
    #[arg(long, default_value = "10")]
    k_fold: usize,

    /// Stratify folds by class
    #[arg(long)]
    balanced: bool,

    /// Run the search on the background training gateway
    #[arg(long = "async")]
    run_async: bool,

    /// Gateway worker threads (defaults to available cores, at most 4)
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Args)]
struct PredictArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    #[command(flatten)]
    data: DataArgs,

    /// Output predictions file (optional, prints to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print raw decision values instead of labels where available
    #[arg(long)]
    raw: bool,
}

#[derive(Args)]
struct EvaluateArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    #[command(flatten)]
    data: DataArgs,
}

#[derive(Args)]
struct InfoArgs {
    /// Model file
    model: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Train(args) => train_command(args),
        Commands::TrainAuto(args) => train_auto_command(args),
        Commands::Predict(args) => predict_command(args),
        Commands::Evaluate(args) => evaluate_command(args),
        Commands::Info(args) => info_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn load_dataset(args: &DataArgs, n_features: Option<usize>) -> Result<TrainData> {
    let format = if args.format == "auto" {
        detect_format(&args.data)
    } else {
        args.format.clone()
    };

    info!("Loading {:?} as {format} format", args.data);
    let data = match format.as_str() {
        "libsvm" => {
            let reader = match n_features {
                Some(n) => LibSvmReader::new().with_n_features(n),
                None => LibSvmReader::new(),
            };
            reader.load_file(&args.data)?
        }
        "csv" => CsvReader::new().load_file(&args.data)?,
        _ => {
            return Err(SVMError::InvalidArgument(format!(
                "Unsupported format: {format}. Use 'libsvm' or 'csv'"
            )))
        }
    };
    info!(
        "Loaded {} samples with {} features",
        data.n_samples(),
        data.n_features()
    );
    Ok(data)
}

fn report_error(svm: &Svm, data: &TrainData, use_test_subset: bool, label: &str) -> Result<()> {
    let out = svm.calc_error(data, use_test_subset)?;
    if svm.is_classifier() {
        println!("{label} error: {:.2}%", out.error * 100.0);
    } else {
        println!("{label} MSE: {:.6}", out.error);
    }
    Ok(())
}

fn train_command(args: TrainArgs) -> Result<()> {
    let mut data = load_dataset(&args.data, None)?;
    if let Some(ratio) = args.train_ratio {
        data.set_train_test_split_ratio(ratio)?;
    }

    let mut svm = args.model.build()?;
    let converged = svm.train(&data, TrainFlags::NONE)?;
    if !converged {
        warn!("Solver stopped at the iteration limit");
    }
    info!("Training completed successfully");

    svm.save(&args.output)?;
    info!("Model saved to: {:?}", args.output);
    println!("Support vectors: {}", svm.support_vectors()?.nrows());

    report_error(&svm, &data, false, "Training")?;
    if data.test_count() > 0 {
        report_error(&svm, &data, true, "Test")?;
    }
    Ok(())
}

fn train_auto_command(args: TrainAutoArgs) -> Result<()> {
    let data = Arc::new(load_dataset(&args.data, None)?);
    let config = CrossValidationConfig::new()
        .with_k_fold(args.k_fold)
        .with_balanced(args.balanced);
    let svm = args.model.build()?;

    let svm = if args.run_async {
        let mut gateway_config = GatewayConfig::default();
        if let Some(workers) = args.workers {
            gateway_config = gateway_config.with_workers(workers);
        }
        let mut gateway = TrainingGateway::new(gateway_config)?;
        let model = SharedSvm::new(svm);
        let outcome = Rc::new(RefCell::new(None));

        let slot = Rc::clone(&outcome);
        gateway.train_auto_async(&model, Arc::clone(&data), config, move |result| {
            *slot.borrow_mut() = Some(result);
        })?;
        gateway.wait_all();

        let result = outcome.borrow_mut().take();
        result.unwrap_or(Err(SVMError::GatewayClosed))?;
        let trained = model.lock().clone();
        trained
    } else {
        let mut svm = svm;
        svm.train_auto(&data, &config)?;
        svm
    };

    let params = svm.params();
    println!(
        "Best parameters: C={} gamma={} p={} nu={} coef0={} degree={}",
        params.c, params.gamma, params.p, params.nu, params.coef0, params.degree
    );
    svm.save(&args.output)?;
    info!("Model saved to: {:?}", args.output);

    report_error(&svm, &data, false, "Training")
}

fn predict_command(args: PredictArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let svm = Svm::from_file(&args.model)?;
    let data = load_dataset(&args.data, Some(svm.var_count()))?;

    let flags = if args.raw {
        PredictFlags::RAW_OUTPUT
    } else {
        PredictFlags::NONE
    };
    let predictions = svm.predict(data.samples(), flags)?.into_vec();

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };
    writeln!(writer, "# Predictions for {} samples", predictions.len())?;
    for (i, value) in predictions.iter().enumerate() {
        writeln!(writer, "{i} {value}")?;
    }
    writer.flush()?;

    if let Some(path) = &args.output {
        info!("Predictions saved to: {path:?}");
    }
    Ok(())
}

fn evaluate_command(args: EvaluateArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let svm = Svm::from_file(&args.model)?;
    let data = load_dataset(&args.data, Some(svm.var_count()))?;

    println!("=== Model Evaluation ===");
    println!("Samples: {}", data.n_samples());
    report_error(&svm, &data, false, "Test")
}

fn info_command(args: InfoArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let document = SerializableModel::load_from_file(&args.model)?;
    // Reject documents that would not load as a model
    document.to_trained_model()?;

    document.print_summary();

    println!("\nDecision functions:");
    let n_show = document.decision_functions.len().min(10);
    for (i, df) in document.decision_functions.iter().take(n_show).enumerate() {
        println!("  #{i}: rho={:.6} support={}", df.rho, df.alpha.len());
    }
    if document.decision_functions.len() > n_show {
        println!("  ... ({} more)", document.decision_functions.len() - n_show);
    }

    Ok(())
}

fn detect_format(path: &Path) -> String {
    if let Some(ext) = path.extension() {
        match ext.to_str() {
            Some("csv") => "csv".to_string(),
            Some("libsvm") | Some("svm") => "libsvm".to_string(),
            _ => {
                warn!("Unknown file extension, assuming LibSVM format");
                "libsvm".to_string()
            }
        }
    } else {
        warn!("No file extension, assuming LibSVM format");
        "libsvm".to_string()
    }
}
