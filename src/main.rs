use chrono::Local;
use clap::{Command, CommandFactory, Parser};
use clap_complete::{generate, Generator};
use mac_harness::{
    bench_result::{ComparisonReport, HarnessRunResult, VerificationSummary},
    cmd_args::Args,
    perf,
    settings::Settings,
    testbench::{CycleHost, GpuModel, MemoryConfig, TestSuite, Tolerance, UnitHarness},
};
use rand::{rngs::StdRng, SeedableRng};
use std::io;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    simple_logger::init_with_level(log::Level::Info)?;
    let start_time = std::time::Instant::now();

    let mut config_names = vec![String::from("configs/default.toml")];
    let args = Args::parse();
    if let Some(generator) = args.generator {
        let mut cmd = Args::command();
        eprintln!("Generating completion file for {:?}...", generator);
        print_completions(generator, &mut cmd);
        return Ok(());
    }
    println!("{:?}", args);

    // config_names append args
    for arg in args.config_names.into_iter() {
        config_names.push(arg);
    }

    let mut results = HarnessRunResult::new();
    let settings = Settings::new(config_names)?;
    results.settings = Some(settings.clone());
    println!("{}", serde_json::to_string_pretty(&settings)?);
    // create the folder for output
    std::fs::create_dir_all("output")?;

    let mut rng = StdRng::seed_from_u64(settings.harness.seed);

    // build the bench: host capability, background models, harness
    let mem_config = MemoryConfig {
        latency_ns: settings.memory.latency_ns,
        clock_period_ns: settings.gpu.clock_period_ns,
    };
    let host = CycleHost::new(
        settings.gpu.num_units,
        mem_config,
        GpuModel::new(settings.gpu.num_units),
    );
    let tolerance = Tolerance {
        relative: settings.harness.relative_tolerance,
        absolute: settings.harness.absolute_tolerance,
    };
    let mut harness = UnitHarness::new(host, tolerance);
    harness.setup()?;

    // run the verification suite
    let suite = TestSuite::from_settings(&settings.harness, settings.gpu.clock_period_ns);
    let mut cases = Vec::new();
    cases.push(suite.basic_case(&mut harness, &mut rng)?);
    cases.extend(suite.parallel_case(&mut harness, &mut rng)?);
    let (performance_case, measured) = suite.performance_case(&mut harness, &mut rng)?;
    cases.push(performance_case);

    // analytic part: throughput, scaling search, reference comparison
    let gpu_config = settings.gpu_config();
    let scaling = perf::scaling_options(&gpu_config, settings.analysis.target_tops);
    let reference = perf::compare_to_reference(
        &gpu_config,
        settings.gpu.power_watts,
        settings.gpu.cache_line_bits,
        &settings.analysis.reference,
    );
    let matrix_benchmarks =
        perf::modeled_matrix_benchmark(&gpu_config, &settings.analysis.benchmark_sizes, &mut rng)?;

    results.report = Some(ComparisonReport {
        verification: VerificationSummary::new(cases),
        benchmarks: vec![measured],
        matrix_benchmarks,
        scaling,
        reference,
    });

    // record the simulation time
    let simulation_time = start_time.elapsed().as_secs();
    // record the result
    let seconds = simulation_time % 60;
    let minutes = (simulation_time / 60) % 60;
    let hours = (simulation_time / 60) / 60;
    let time_str = format!("{}:{}:{}", hours, minutes, seconds);
    results.simulation_time = time_str;

    let current_time: String = Local::now().format("%Y-%m-%d-%H-%M-%S%.6f").to_string();
    let output_path = format!("output/{}.json", current_time);

    println!("{}", serde_json::to_string_pretty(&results)?);
    // write json of results to output_path
    std::fs::write(output_path, serde_json::to_string_pretty(&results)?)?;
    Ok(())
}
