use clap::{Arg, ArgMatches, Command};
use ikasim::logging::{LogConfig, LogOutput, init_logging, level_from_verbosity, parse_log_level};
use ikasim::output::RecordWriter;
use ikasim::scenario::{CityPreset, ScenarioConfig};
use ikasim::simulation::SimulationEngine;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("ikasim")
        .version("0.1.0")
        .about("移動センサーユニット合成データ生成 (IKA Sensor Simulation)")
        .long_about(
            "都市境界内を移動するセンサーユニット群をシミュレートし、\n\
             位置と環境センサー値を1分ごとにCSVへ出力します。",
        )
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .conflicts_with("city"),
        )
        .arg(
            Arg::new("city")
                .short('c')
                .long("city")
                .value_name("CITY")
                .help("組み込みの都市プリセット (ankara, aydin, istanbul)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("出力CSVファイル（シナリオの設定を上書き）"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("N")
                .value_parser(clap::value_parser!(u64))
                .help("乱数シード（シナリオの設定を上書き）"),
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: 進行状況, -vv: 詳細, -vvv: トレース)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)。-v より優先"),
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .default_value("console")
                .help("ログ出力先 (console, file, both)"),
        )
        .get_matches();

    let verbose_level = matches.get_count("verbose");

    let log_output = match LogOutput::from_str(matches.get_one::<String>("log-output").map_or("console", |s| s)) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    };
    let level = match matches.get_one::<String>("log-level") {
        Some(value) => match parse_log_level(value) {
            Ok(level) => level,
            Err(e) => {
                eprintln!("エラー: {}", e);
                std::process::exit(1);
            }
        },
        None => level_from_verbosity(verbose_level),
    };
    let _guard = match init_logging(LogConfig {
        level,
        output: log_output,
        ..LogConfig::default()
    }) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("エラー: ログ初期化に失敗しました: {}", e);
            std::process::exit(1);
        }
    };

    println!("IKA センサーシミュレーション - ikasim v0.1.0");
    println!();

    let scenario = match load_scenario(&matches) {
        Ok(Some(scenario)) => scenario,
        Ok(None) => {
            show_default_help();
            return;
        }
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run_scenario(scenario, matches.get_flag("info"), verbose_level) {
        eprintln!("エラー: {}", e);
        std::process::exit(1);
    }
}

/// シナリオファイルまたはプリセットを読み込み、コマンドラインの上書きを適用
fn load_scenario(matches: &ArgMatches) -> Result<Option<ScenarioConfig>, Box<dyn std::error::Error>> {
    let mut scenario = if let Some(path) = matches.get_one::<String>("scenario") {
        ScenarioConfig::from_file(path)?
    } else if let Some(city) = matches.get_one::<String>("city") {
        ScenarioConfig::preset(CityPreset::from_str(city)?)?
    } else {
        return Ok(None);
    };

    if let Some(output) = matches.get_one::<String>("output") {
        scenario.output.path = PathBuf::from(output);
    }
    if let Some(seed) = matches.get_one::<u64>("seed") {
        scenario.sim.seed = *seed;
    }

    Ok(Some(scenario))
}

/// シナリオの実行
fn run_scenario(scenario: ScenarioConfig, info_only: bool, verbose_level: u8) -> Result<(), Box<dyn std::error::Error>> {
    scenario.print_summary();
    println!();

    if info_only {
        return Ok(());
    }

    let output_path = scenario.output.path.clone();
    let mut writer = RecordWriter::from_path(&output_path)?;

    let mut simulation = SimulationEngine::new(scenario, verbose_level)?;
    simulation.initialize()?;
    let stats = simulation.run(&mut writer)?;

    info!(path = %output_path.display(), rows = stats.rows, "CSVを書き出しました");
    println!("=== 実行結果 ===");
    println!("出力ファイル: {}", output_path.display());
    println!("レコード数: {}", stats.rows);
    println!("ティック数: {}", stats.ticks);
    println!("再計画回数: {}", stats.replans);
    println!("異常値注入: {}", stats.anomalies);

    Ok(())
}

/// デフォルトヘルプと都市プリセット一覧を表示
fn show_default_help() {
    println!("使用方法:");
    println!("  ikasim [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>    シナリオファイルを指定して実行");
    println!("  -c, --city <CITY>        組み込みの都市プリセットで実行");
    println!("  -o, --output <FILE>      出力CSVファイル");
    println!("      --seed <N>           乱数シード");
    println!("  -i, --info               シナリオ情報のみ表示");
    println!("  -v, --verbose            詳細出力 (複数指定で詳細レベル上昇)");
    println!("      --log-level <LEVEL>  ログレベル");
    println!("      --log-output <TARGET> ログ出力先 (console, file, both)");
    println!("  -h, --help               このヘルプを表示");
    println!();
    println!("利用可能な都市プリセット:");
    for city in CityPreset::ALL {
        println!("  {}", city.name());
    }
    println!();
    println!("例:");
    println!("  ikasim -c ankara");
    println!("  ikasim -c istanbul -o istanbul.csv --seed 7 -v");
    println!("  ikasim -s scenarios/aydin.yaml -i");
}
