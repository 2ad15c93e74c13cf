use std::path::PathBuf;

use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::encode::pattern::PatternEncoder;
use pmxread::LanguageType;
use pmxscene::{ImportError, ImportOptions, ModelReport, ReportSections};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let app = clap::Command::new("pmx_dump")
        .version("0.1.0")
        .about("Print a summary of a PMX model")
        .arg(
            clap::arg!(
                --model <FILE> "Path to the model to load"
            )
            .required(true)
            .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            clap::arg!(
                --texture <DIR> "Path to the texture directory"
            )
            .required(false)
            .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            clap::arg!(
                --scale <F> "Uniform scale applied to the model"
            )
            .required(false)
            .default_value("1.0")
            .value_parser(clap::value_parser!(f32)),
        )
        .arg(clap::arg!(--japanese "Prefer Japanese names"))
        .arg(
            clap::arg!(
                --sections <LIST> "Comma separated report sections: header, geometry, textures, materials, bones, morphs, all"
            )
            .required(false)
            .default_value("all"),
        );

    let matches = app.get_matches();
    let model_path = matches
        .get_one::<PathBuf>("model")
        .ok_or("Parameter `model` is required. ")?;
    let sections = matches
        .get_one::<String>("sections")
        .map(String::as_str)
        .unwrap_or("all");
    let sections = ReportSections::parse_list(sections)
        .ok_or_else(|| format!("Unknown report section in `{}`", sections))?;
    let options = ImportOptions {
        scale: matches.get_one::<f32>("scale").copied().unwrap_or(1.0f32),
        language: if matches.get_flag("japanese") {
            LanguageType::Japanese
        } else {
            LanguageType::English
        },
        texture_dir: matches.get_one::<PathBuf>("texture").cloned(),
    };

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S.%6f)} [{level}] - {m} [{file}:{line}]{n}",
        )))
        .build();
    let config = log4rs::config::Config::builder()
        .appender(log4rs::config::Appender::builder().build("stderr", Box::new(stderr)))
        .build(
            log4rs::config::Root::builder()
                .appender("stderr")
                .build(log::LevelFilter::Info),
        )?;
    log4rs::init_config(config)?;

    let imported = match pmxscene::import_file(model_path, &options) {
        Ok(imported) => imported,
        Err(ImportError::Decode(err)) => {
            eprintln!(
                "{}: failed in {} section at offset {}: {}",
                model_path.display(),
                err.section,
                err.offset,
                err.status
            );
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{}: {}", model_path.display(), err);
            std::process::exit(1);
        }
    };

    print!(
        "{}",
        ModelReport::new(imported.model(), options.language, sections)
    );
    if !imported.warnings().is_empty() {
        println!("== Directive warnings ({})", imported.warnings().len());
        for warning in imported.warnings() {
            println!("{}", warning);
        }
    }
    match imported.skeleton() {
        Ok(skeleton) => log::info!(
            "Skeleton: {} bone(s) reachable from {} root(s)",
            skeleton.len(),
            skeleton.roots.len()
        ),
        Err(err) => log::warn!("Skeleton unavailable: {}", err),
    }
    Ok(())
}
