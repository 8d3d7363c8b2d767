use lib::{PipelineError, Result, RunLog, RunOptions, RunOutcome, run};
use std::fs;
use std::path::Path;
use tempfile::{TempDir, tempdir};

const CEMADEN_CSV: &str = "\
municipio,codEstacao,uf,nomeEstacao,latitude,longitude,datahora,valorMedida
CUIABÁ,510340301A,MT,Jardim Liberdade,-55.99,-15.61,2020-12-04 22:20:00.0,0.40,
CUIABÁ,510340302A,MT,Centro América,-56.01,-15.62,2020-12-05 01:10:00.0,3.00,
";

const INMET_CSV: &str = "\
REGIAO:,CO
UF:,MT
ESTACAO:,CUIABA
CODIGO (WMO):,A901
LATITUDE:,-15.55
LONGITUDE:,-56.06
ALTITUDE:,240.0
DATA DE FUNDACAO:,2006-11-03
Data,Hora UTC,VENTO DIRECAO,VENTO RAJADA,VENTO VELOCIDADE,
2020/12/04,2200 UTC,90,8.1,2.5,
2020/12/04,2300 UTC,180,6.0,1.5,
";

fn options(dir: &TempDir) -> RunOptions {
    RunOptions {
        config_path: dir.path().join("config.toml"),
        output: dir.path().join("report.pdf"),
        scratch_dir: dir.path().join("tmp"),
    }
}

fn write_config(dir: &TempDir, files: &str) -> Result<()> {
    let config = format!(
        r#"[files]
{}

[time]
start = "2020-12-04 22"
end = "2020-12-05 00"

[cemaden]
plots = false

[inmet]
windrose = false

[report]
summary = "{}"
"#,
        files,
        dir.path().join("summary.json").display()
    );
    fs::write(dir.path().join("config.toml"), config)?;
    Ok(())
}

fn source(dir: &TempDir, name: &str, content: &str) -> Result<String> {
    let path = dir.path().join(name);
    fs::write(&path, content)?;
    Ok(path.display().to_string())
}

fn scratch_is_empty(path: &Path) -> bool {
    fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(true)
}

#[test]
fn test_missing_config_creates_template() -> Result<()> {
    let dir = tempdir()?;
    let options = options(&dir);
    let mut run_log = RunLog::new(Vec::new(), true);

    let outcome = run(&options, &mut run_log)?;

    assert_eq!(outcome, RunOutcome::TemplateCreated(options.config_path.clone()));
    assert!(fs::read_to_string(&options.config_path)?.contains("[time]"));
    assert!(!options.output.exists());

    let text = String::from_utf8(run_log.into_inner()).unwrap();
    assert!(text.starts_with("\nWarning:\n  No such file or directory:"));
    assert!(text.contains("Default configuration file created. Check values to proceed"));
    Ok(())
}

#[test]
fn test_full_report() -> Result<()> {
    let dir = tempdir()?;
    let cemaden = source(&dir, "cemaden.csv", CEMADEN_CSV)?;
    let inmet = source(&dir, "inmet.csv", INMET_CSV)?;
    write_config(
        &dir,
        &format!("cemaden = \"{}\"\ninmet = \"{}\"", cemaden, inmet),
    )?;
    let options = options(&dir);
    let mut run_log = RunLog::new(Vec::new(), true);

    let outcome = run(&options, &mut run_log)?;

    assert_eq!(outcome, RunOutcome::ReportWritten(options.output.clone()));
    assert!(fs::read(&options.output)?.starts_with(b"%PDF"));
    assert!(scratch_is_empty(&options.scratch_dir));

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("summary.json"))?)?;
    let stations = &summary["cemaden"]["stations"];
    assert_eq!(stations[0]["name"], "Jardim Liberdade");
    assert_eq!(stations[0]["total"], 0.40);
    assert_eq!(stations[1]["total"], 0.0);
    assert_eq!(summary["cemaden"]["mean_total"], 0.20);
    assert_eq!(summary["inmet"]["observations"], 2);
    assert_eq!(summary["inmet"]["stats"]["max_gust"], 8.1);
    assert_eq!(summary["inmet"]["stats"]["mean_speed"], 2.0);

    let text = String::from_utf8(run_log.into_inner()).unwrap();
    assert!(text.contains("  Cemaden...\n  Inmet...\n"));
    Ok(())
}

#[test]
fn test_missing_wind_source_writes_nothing() -> Result<()> {
    let dir = tempdir()?;
    let missing = dir.path().join("inmet.csv");
    write_config(&dir, &format!("inmet = \"{}\"", missing.display()))?;
    let options = options(&dir);
    let mut run_log = RunLog::new(Vec::new(), false);

    let result = run(&options, &mut run_log);

    match result {
        Err(PipelineError::SourceFileNotFound(path)) => assert_eq!(path, missing),
        other => panic!("expected SourceFileNotFound, got {:?}", other),
    }
    assert!(!options.output.exists());
    assert!(!dir.path().join("summary.json").exists());
    Ok(())
}

#[test]
fn test_no_sources_is_an_error() -> Result<()> {
    let dir = tempdir()?;
    write_config(&dir, "")?;
    let options = options(&dir);
    let mut run_log = RunLog::new(Vec::new(), false);

    assert!(matches!(
        run(&options, &mut run_log),
        Err(PipelineError::NothingToReport)
    ));
    assert!(!options.output.exists());
    Ok(())
}

#[test]
fn test_reversed_window_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let cemaden = source(&dir, "cemaden.csv", CEMADEN_CSV)?;
    let config = format!(
        "[files]\ncemaden = \"{}\"\n\n[time]\nstart = \"2020-12-05 00\"\nend = \"2020-12-04 22\"\n",
        cemaden
    );
    fs::write(dir.path().join("config.toml"), config)?;
    let options = options(&dir);
    let mut run_log = RunLog::new(Vec::new(), false);

    assert!(matches!(
        run(&options, &mut run_log),
        Err(PipelineError::InvalidWindow { .. })
    ));
    Ok(())
}

#[test]
fn test_failed_summary_still_cleans_scratch() -> Result<()> {
    let dir = tempdir()?;
    let cemaden = source(&dir, "cemaden.csv", CEMADEN_CSV)?;
    let summary = dir.path().join("missing").join("summary.json");
    let config = format!(
        "[files]\ncemaden = \"{}\"\n\n[time]\nstart = \"2020-12-04 22\"\nend = \"2020-12-05 00\"\n\n\
         [cemaden]\nplots = false\n\n[report]\nsummary = \"{}\"\n",
        cemaden,
        summary.display()
    );
    fs::write(dir.path().join("config.toml"), config)?;
    let options = options(&dir);
    let mut run_log = RunLog::new(Vec::new(), false);

    let result = run(&options, &mut run_log);

    assert!(matches!(result, Err(PipelineError::Io(_))));
    assert!(fs::read(&options.output)?.starts_with(b"%PDF"));
    assert!(scratch_is_empty(&options.scratch_dir));
    assert!(!summary.exists());
    Ok(())
}
