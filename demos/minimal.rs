use mltrack::{
    api::metric::ConfusionMatrix,
    backend::memory::{InMemoryModelRepository, InMemoryStorage},
    ContextBuilder,
};
use nanorand::{WyRand, RNG};

fn main() -> mltrack::Result<()> {
    const EXPERIMENT: &str = "My Experiment";
    let context = ContextBuilder::new()
        .use_storage(InMemoryStorage::new())
        .use_model_repository(InMemoryModelRepository::new())
        .build()?;
    let experiment = context.lifecycle().create_experiment(EXPERIMENT)?;

    for i in 0..3 {
        println!("Executing run {}", i);
        let run = context.lifecycle().create_run(&experiment, &format!("run {}", i))?;
        context.training().log_hyperparameter(&run, "i", &format!("{}", i))?;
        context.training().log_hyperparameter(&run, "constant", "42")?;
        let mut rng = WyRand::new_seed(i);
        context
            .training()
            .train(&run, || -> Result<(), ()> {
                for _ in 0..10 {
                    let _: u16 = rng.generate();
                }
                Ok(())
            })?
            .expect("training cannot fail");
        let counts: Vec<u64> = (0..4).map(|_| rng.generate_range::<u64>(0, 50)).collect();
        let matrix = ConfusionMatrix::binary(counts[0], counts[1], counts[2], counts[3]);
        context.evaluation().log_confusion_matrix(&run, &matrix)?;
    }

    for run in context.lifecycle().list_runs(&experiment)? {
        let matrix = context.evaluation().get_confusion_matrix(&run.run_id)?.matrix()?;
        println!("{} trained in {:?}, accuracy {:?}", run.name, run.training_time, matrix.accuracy());
    }
    Ok(())
}
