use anyhow::Result;
use mltrack::{
    api::metric::{ConfusionMatrix, Goal},
    ContextBuilder, Error, TrackingConfig,
};
use nanorand::{WyRand, RNG};
use std::path::PathBuf;

struct Args {
    experiment: String,
    config: Option<PathBuf>,
    runs: u32,
}

impl Args {
    pub fn from_env() -> Result<Self> {
        let mut args = pico_args::Arguments::from_env();
        Ok(Args {
            experiment: args.value_from_str(["-e", "--experiment"])?,
            config: args.opt_value_from_str(["-c", "--config"])?,
            runs: args.opt_value_from_str(["-r", "--runs"])?.unwrap_or(1),
        })
    }
}

fn main() -> Result<()> {
    let args = Args::from_env()?;
    let config = match &args.config {
        Some(path) => TrackingConfig::from_file(path)?,
        None => TrackingConfig::default(),
    };
    let context = ContextBuilder::from_config(&config)?.build()?;

    let experiment = match context.lifecycle().list_experiments()?.into_iter().find(|e| e.name == args.experiment) {
        Some(experiment) => {
            println!(
                "Experiment {} with id {} was fetched successfully!",
                experiment.name, experiment.experiment_id
            );
            experiment.experiment_id
        }
        None => match context.lifecycle().create_experiment(&args.experiment) {
            Ok(id) => {
                println!("Experiment with id {} was created successfully!", id);
                id
            }
            Err(Error::InvalidArgument(reason)) => {
                println!("Could not create the experiment: {}", reason);
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        },
    };

    for i in 0..args.runs {
        println!("Executing run {}", i);
        let run = context.lifecycle().create_run(&experiment, &format!("run {}", i))?;
        context.training().log_hyperparameter(&run, "i", &format!("{}", i))?;
        context.training().log_hyperparameter(&run, "constant", "42")?;
        let mut rng = WyRand::new_seed(i.into());
        let mut value = 0.0;
        for _ in 0..10 {
            let int: f64 = rng.generate::<u16>().into();
            let max: f64 = std::u16::MAX.into();
            value = int / max;
            context.evaluation().log_metric(&run, "rand", value)?;
        }
        let correct = (value * 100.0) as u64;
        let matrix = ConfusionMatrix::binary(correct / 2, (100 - correct) / 2, (100 - correct) / 2, correct / 2);
        context.evaluation().log_confusion_matrix(&run, &matrix)?;
        context.model().upload_model(&run, &value.to_le_bytes())?;
        context.lifecycle().complete_run(&run)?;
    }

    if let Some(best) = context.evaluation().best_run(&experiment, "rand", Goal::Maximize)? {
        println!("Best run is {} ({})", best.name, best.run_id);
    }
    Ok(())
}
