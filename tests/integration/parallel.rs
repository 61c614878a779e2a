//! Integration tests for parallel sessions
//!
//! Many subject files run against one compiled unit must produce the same
//! graphs, in the same order, whatever the worker count.

use planardl_foundation::{ErrorKind, Value};
use planardl_runtime::{SessionConfig, SubjectFile};
use proptest::prelude::*;

use crate::compose::{COMPOSE_FILE, app, schema, session, unit};

fn compose_file(services: &[(String, u32)]) -> String {
    let mut out = String::from("services:\n");
    for (name, port) in services {
        out.push_str(&format!("  {name}:\n    image: {name}-image\n    ports: {port}\n"));
    }
    out
}

fn files(count: usize) -> Vec<SubjectFile> {
    (0..count)
        .map(|i| {
            let services = vec![(format!("svc{i}"), 8000 + u32::try_from(i).unwrap_or(0))];
            SubjectFile::new(format!("compose-{i}.yml"), compose_file(&services))
        })
        .collect()
}

#[test]
fn worker_count_does_not_change_results() {
    let files = files(32);

    let sequential = session(SessionConfig::sequential());
    let expected: Vec<_> = sequential
        .run_files(&unit(&sequential), &files)
        .unwrap()
        .into_iter()
        .map(|o| o.unwrap().graph)
        .collect();

    let parallel = session(SessionConfig::default().with_parallelism(4));
    let actual: Vec<_> = parallel
        .run_files(&unit(&parallel), &files)
        .unwrap()
        .into_iter()
        .map(|o| o.unwrap().graph)
        .collect();

    assert_eq!(actual, expected);
    assert_eq!(
        actual[17].facts()[0].field("name"),
        Some(&Value::from("svc17"))
    );
}

#[test]
fn one_bad_file_does_not_stop_the_others() {
    let session = session(SessionConfig::default().with_parallelism(2));
    let unit = unit(&session);
    let files = vec![
        SubjectFile::new("good.yml", COMPOSE_FILE),
        SubjectFile::new("bad.yml", "services:\n web:\n"),
        SubjectFile::new("empty.yml", ""),
    ];

    let outcomes = session.run_files(&unit, &files).unwrap();
    assert_eq!(outcomes[0].as_ref().unwrap().graph.len(), 4);
    let err = outcomes[1].as_ref().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Parse(_)));
    assert!(outcomes[2].as_ref().unwrap().graph.is_empty());
}

#[test]
fn units_compile_independently() {
    let session = session(SessionConfig::default().with_parallelism(3));
    let results = session.compile_all(vec![app(), schema(), app()]);

    assert!(results.iter().all(Result::is_ok));
    let plans: Vec<_> = results
        .iter()
        .map(|r| r.as_ref().map(|u| u.plans().len()).unwrap_or_default())
        .collect();
    assert_eq!(plans, vec![1, 0, 1]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn graphs_match_subject_services(
        services in prop::collection::vec(("[a-z]{1,6}", 1u32..70_000), 0..8)
    ) {
        let session = session(SessionConfig::default().with_parallelism(2));
        let unit = unit(&session);
        let file = SubjectFile::new("gen.yml", compose_file(&services));

        let outcome = session
            .run_files(&unit, &[file.clone(), file])
            .unwrap()
            .into_iter()
            .map(|o| o.unwrap())
            .collect::<Vec<_>>();

        prop_assert_eq!(&outcome[0].graph, &outcome[1].graph);
        prop_assert_eq!(outcome[0].graph.count_of("docker.compose.Service"), services.len());
        let out_of_range = services.iter().filter(|(_, port)| *port > 65_535).count();
        prop_assert_eq!(outcome[0].diagnostics.len(), out_of_range);
    }
}
