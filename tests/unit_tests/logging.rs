use feassemble::assembly::{Action, BilinearForm, FormArgument, ItemIntegrator, LinearForm};
use feassemble::element::FiniteElementType::*;
use feassemble::operator::FunctionOperator::*;
use feassemble::space::FiniteElementSpace;
use log::{Level, LevelFilter, Log, Metadata, Record};
use nalgebra::{DMatrix, DVector};
use std::sync::{Mutex, Once};
use util::triangle_grid;

struct RecordingLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for RecordingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with("feassemble")
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.records
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static LOGGER: RecordingLogger = RecordingLogger {
    records: Mutex::new(Vec::new()),
};

fn install_logger() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
}

fn logged_at(level: Level, message: &str) -> bool {
    LOGGER
        .records
        .lock()
        .unwrap()
        .iter()
        .any(|(l, m)| *l == level && m.contains(message))
}

#[test]
fn assembly_entry_points_log_at_debug_level() {
    install_logger();
    let mesh = triangle_grid(2);
    let space = FiniteElementSpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let v = FormArgument::new(&space, Identity);
    let n = space.num_dofs();
    let u = DVector::from_element(n, 1.0);

    let mut b = DVector::zeros(n);
    LinearForm::new(v, Action::identity(1))
        .assemble_into(&mut b, 1.0)
        .unwrap();
    let form = BilinearForm::new(v, v, Action::identity(1));
    form.assemble_into(DMatrix::zeros(n, n)).unwrap();
    form.assemble_vector_into(&mut b, 1, &u).unwrap();
    let integrator = ItemIntegrator::new(vec![v], Action::identity(1));
    integrator.evaluate_per_item(&[&u]).unwrap();
    integrator.par_evaluate_per_item(&[&u]).unwrap();

    for message in [
        "Assembled linear form",
        "Assembled bilinear form over",
        "Assembled bilinear form vector",
        "Integrated",
        "in parallel",
    ] {
        assert!(logged_at(Level::Debug, message), "no debug record containing {message:?}");
    }
    let records = LOGGER.records.lock().unwrap();
    assert!(records.iter().all(|(level, _)| *level != Level::Info));
}
