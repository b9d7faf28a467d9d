use std::path::PathBuf;

use argh::FromArgs;

use stencil_batch::{BatchConfig, Orchestrator};

#[derive(FromArgs, Debug)]
/// Match template images against every image of a directory.
struct Args {
    /// path to a JSON configuration file, command line options take precedence
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// path to a template image, repeat for several templates
    #[argh(option, short = 't')]
    template: Vec<PathBuf>,

    /// directory whose files are all used as templates
    #[argh(option)]
    template_dir: Option<PathBuf>,

    /// directory containing the target images
    #[argh(option, short = 'i')]
    target_dir: Option<PathBuf>,

    /// directory receiving the match images
    #[argh(option, short = 'o')]
    output_dir: Option<PathBuf>,

    /// ratio test threshold
    #[argh(option, short = 'r')]
    ratio: Option<f32>,

    /// number of targets processed concurrently
    #[argh(option, short = 'n')]
    workers: Option<usize>,

    /// extension of the match images, e.g. jpg or png
    #[argh(option)]
    ext: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<BatchConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => BatchConfig::from_file(path)?,
            None => BatchConfig::default(),
        };

        if !self.template.is_empty() {
            config.templates = self.template;
        }
        if let Some(dir) = self.template_dir {
            config.template_dir = Some(dir);
        }
        if let Some(dir) = self.target_dir {
            config.target_dir = dir;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(ratio) = self.ratio {
            config.ratio_threshold = ratio;
        }
        if let Some(workers) = self.workers {
            config.num_workers = workers;
        }
        if let Some(ext) = self.ext {
            config.output_extension = ext;
        }

        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let args: Args = argh::from_env();
    let config = args.into_config()?;

    let orchestrator = Orchestrator::new(config)?;
    let report = orchestrator.run()?;

    println!("All match results have been processed: {}", report.summary());

    Ok(())
}
