use approx::assert_relative_eq;
use nalgebra::Vector3;
use segmir_core::{
    apply_rigid_motion, influence_matrix, FrameEngine, MirrorGeometry, PanelType, Pose, SolverParams,
    StewartGeometry, StewartPlatform,
};

fn engines() -> Vec<FrameEngine> {
    [
        MirrorGeometry::primary(),
        MirrorGeometry::secondary(),
        MirrorGeometry::test_stand(),
    ]
    .into_iter()
    .map(|g| FrameEngine::new(&g.expect("geometry"), &SolverParams::default()).expect("engine"))
    .collect()
}

#[test]
fn panel_frame_round_trip_on_every_mirror() {
    let point = Vector3::new(-150.0, 88.0, 595.0);
    for engine in engines() {
        for ring in 1..=engine.topology().rings.len() as u32 {
            for pos in engine.topology().ring_positions(ring).expect("ring") {
                let trf = engine.to_telescope_frame(pos, &point).expect("trf");
                let prf = engine.to_panel_frame(pos, &trf).expect("prf");
                assert_relative_eq!(prf, point, epsilon = 1e-9);
            }
        }
    }
}

#[test]
fn kinematics_round_trip_for_every_panel_type() {
    let motions = [
        Pose::default(),
        Pose::new(4.0, -3.0, 10.0, 0.0, 0.0, 0.0),
        Pose::new(-1.0, 2.0, -5.0, 0.03, -0.04, 0.02),
        Pose::new(0.0, 0.0, 0.0, -0.05, 0.05, -0.05),
    ];
    for panel_type in [PanelType::P1, PanelType::P2, PanelType::S1, PanelType::S2, PanelType::Opt] {
        let sp = StewartPlatform::new(StewartGeometry::for_panel_type(panel_type), SolverParams::default())
            .expect("platform");
        let nominal = sp.nominal_solution().expect("nominal").pose;
        for delta in motions {
            let pose = nominal + delta;
            let lengths = sp.actuator_lengths_from_pads(&sp.pads_from_pose(&pose)).expect("inverse");
            let solved = sp.pose_from_actuator_lengths(&lengths).expect("forward").pose;
            for (a, b) in solved.to_array().iter().zip(pose.to_array()) {
                assert_relative_eq!(*a, b, epsilon = 1e-8);
            }
        }
    }
}

#[test]
fn moving_through_the_telescope_frame_is_consistent() {
    // A motion applied in the telescope frame to a nominal panel and mapped
    // back must give a panel pose the platform can reach and return from.
    let engine = &engines()[0];
    let motion = Pose::new(0.5, -0.25, 1.0, 1e-4, -2e-4, 5e-5);
    for pos in engine.topology().ring_positions(2).expect("ring") {
        let sp = engine.platform(pos).expect("platform");
        let nominal = sp.nominal_solution().expect("nominal");
        let moved = engine
            .pads_to_telescope_frame(pos, &nominal.pads)
            .expect("trf")
            .map(|p| apply_rigid_motion(p, &motion));
        let prf = engine.pads_to_panel_frame(pos, &moved).expect("prf");
        let solution = sp.pose_from_pads(&prf).expect("pose");
        assert_relative_eq!(*solution.pads.matrix(), *prf.matrix(), epsilon = 1e-7);
    }
}

#[test]
fn influence_of_a_panel_on_itself_is_its_own_motion() {
    let engine = &engines()[1];
    let pos = engine.topology().ring_positions(1).expect("ring")[3];
    let m = influence_matrix(engine, pos, pos).expect("influence");
    for j in 0..3 {
        assert_relative_eq!(m[(j, j)], 1.0, epsilon = 1e-7);
    }
}
