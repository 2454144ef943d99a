use crc_survival::{
    ukb::{self, UkbSources},
    Paths, PipelineError,
};
use std::{fs, path::Path};

const REGISTRY: &str = "\
eid,date_of_cancer_diagnosis,type_of_cancer_icd9,type_of_cancer_icd10
1001,2019-05-01,,C180
1002,2015-02-10,,C20
1003,2012-07-01,1534,
1004,2014-01-01,,C61
";

const ICD9: &str = "\
eid,diagnoses_icd9,date_icd9
1003,1530,2011-03-01
";

const ICD10: &str = "\
eid,diagnosis_icd10,date_icd10
1001,C189,2018-11-20
1004,C19,NA
";

const DEATHS: &str = "\
eid,date_death,icd10
1002,2016-01-01,C20
1002,2016-01-01,J18
1003,2020-04-04,I21
";

const INITIAL_VISIT: &str = "\
eid,platelet_count,platelet_count_acquisition_time,date_of_attending_assessment_centre,age_when_attended_assessment_centre,sex,ethnic_background,smoking_status,alcohol_drinker_status,body_mass_index
1001,280,2009-03-02T11:20:00,2009-03-01,61,1,1001,0,1,27.1
1002,415,2008-06-10T09:00:00,2008-06-10,54,0,3001,2,2,22.4
1003,350,2009-01-20T08:30:00,2009-01-14,67,1,-3,-3,0,
";

fn write_inputs(dir: &Path, deaths: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(ukb::REGISTRY_FILE), REGISTRY).unwrap();
    fs::write(dir.join(ukb::ICD9_FILE), ICD9).unwrap();
    fs::write(dir.join(ukb::ICD10_FILE), ICD10).unwrap();
    fs::write(dir.join(ukb::DEATH_FILE), deaths).unwrap();
    fs::write(dir.join(ukb::INITIAL_VISIT_FILE), INITIAL_VISIT).unwrap();
}

fn run_pipeline(paths: &Paths) -> anyhow::Result<()> {
    let sources = UkbSources::load(paths)?;
    let results = ukb::run(&sources)?;
    results.output_files()?.save(&paths.output_dir)
}

fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = Paths::new(tmp.path().join("data"), tmp.path().join("results/00"));
    write_inputs(&paths.data_dir, DEATHS);
    run_pipeline(&paths).unwrap();

    let survival = read(paths.output(ukb::SURVIVAL_OUTPUT));
    assert_eq!(
        survival,
        "\
eid,crc_diagnosis,date_crc_diagnosis,crc_death,date_death,icd10_death,date_last_fu,os,os_time,css,css_time,os_1yr,os_3yr,os_5yr,css_1yr,css_3yr,css_5yr
1001,C189,2018-11-20,,,,2023-01-01,0,1503,0,1503,0,0,,0,0,
1002,C20,2015-02-10,1,2016-01-01,C20+J18,2016-01-01,1,325,1,325,1,1,1,1,1,1
1003,1530,2011-03-01,0,2020-04-04,I21,2020-04-04,1,3322,0,3322,0,0,0,0,0,0
"
    );

    // 1003 was tested 6 days after the visit; everyone was diagnosed after it
    let data = read(paths.output(ukb::DATA_OUTPUT));
    let mut lines = data.lines();
    assert_eq!(
        lines.next().unwrap(),
        "eid,age_at_diagnosis,sex,body_mass_index,ethnic_background,smoking_status,\
         alcohol_drinker_status,diagnostic_lag_time,platelet_count,plt_300,plt_400,os,os_time,\
         os_1yr,os_3yr,os_5yr,css,css_time,css_1yr,css_3yr,css_5yr"
    );
    let ids = lines
        .map(|line| line.split(',').next().unwrap().to_owned())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["1001", "1002", "1003"]);
    assert!(data.contains(",male,27.1,white,never,ever,"));
    assert!(data.contains(",female,22.4,asian,ever,ever,"));
    // integral counts keep their source form
    assert!(data.contains(",280,no,no,"));
    assert!(data.contains(",415,yes,yes,"));
    assert!(!data.contains("280.0"));

    let all = read(paths.output(ukb::ALL_OUTPUT));
    assert_eq!(all.lines().count(), 4);
    assert!(all.contains(",280,2009-03-02,2009-03-01,61,male,"));
}

#[test]
fn rerun_is_identical() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = Paths::new(tmp.path().join("data"), tmp.path().join("out"));
    write_inputs(&paths.data_dir, DEATHS);

    run_pipeline(&paths).unwrap();
    let first = [ukb::SURVIVAL_OUTPUT, ukb::ALL_OUTPUT, ukb::DATA_OUTPUT]
        .map(|name| fs::read(paths.output(name)).unwrap());
    run_pipeline(&paths).unwrap();
    let second = [ukb::SURVIVAL_OUTPUT, ukb::ALL_OUTPUT, ukb::DATA_OUTPUT]
        .map(|name| fs::read(paths.output(name)).unwrap());
    assert_eq!(first, second);
}

#[test]
fn failed_run_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = Paths::new(tmp.path().join("data"), tmp.path().join("out"));
    // 1002 dies before their diagnosis
    let deaths = DEATHS.replace("2016-01-01", "2014-01-01");
    write_inputs(&paths.data_dir, &deaths);

    let err = run_pipeline(&paths).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::NegativeTime { .. })
    ));
    assert!(!paths.output_dir.exists());
}

#[test]
fn missing_extract_names_the_file() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = Paths::new(tmp.path().join("data"), tmp.path().join("out"));
    write_inputs(&paths.data_dir, DEATHS);
    fs::remove_file(paths.input(ukb::DEATH_FILE)).unwrap();

    let err = run_pipeline(&paths).unwrap_err();
    assert!(format!("{:#}", err).contains(ukb::DEATH_FILE));
    assert!(!paths.output_dir.exists());
}
