//! Gear train example: a motor drives a pulverizer through a clutch, and a
//! second motor spins a large gear hub.
//!
//! Loads the block catalog from `data/` (or the directory given as the first
//! argument), builds the contraption in an in-memory world, runs the tick
//! driver, then disengages the clutch, breaks a rim cell off the hub, and
//! round-trips the module through a save.
//!
//! Run with: `RUST_LOG=debug cargo run -p gearworks-examples --example gear_train`

use gearworks_core::event::MechanicalEvent;
use gearworks_core::fixed::fixed64_to_f64;
use gearworks_core::grid::GridPos;
use gearworks_data::load_catalog;
use gearworks_power::MechanicalModule;
use gearworks_spatial::GridWorld;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error>;

fn place(
    module: &mut MechanicalModule,
    world: &mut GridWorld,
    pos: GridPos,
    name: &str,
) -> Result<(), BoxError> {
    let block_type = module
        .registry()
        .block_id(name)
        .ok_or_else(|| format!("catalog has no block named {name}"))?;
    let outcome = module.place(world, pos, block_type)?;
    info!(
        %pos,
        name,
        connections = %outcome.connections,
        network = ?outcome.network,
        "placed"
    );
    Ok(())
}

fn report(module: &MechanicalModule, label: &str, cells: &[(&str, GridPos)]) {
    for (name, pos) in cells {
        info!(
            label,
            part = name,
            angle = format!("{:.3}", fixed64_to_f64(module.current_angle(*pos))),
            speed = format!("{:.3}", fixed64_to_f64(module.current_angular_speed(*pos))),
            "status"
        );
    }
}

fn run(module: &mut MechanicalModule, from: u64, to: u64) {
    for tick in from..to {
        for event in module.tick(tick) {
            match event {
                MechanicalEvent::NetworkStarted { network, tick } => {
                    info!(?network, tick, "network started turning");
                }
                MechanicalEvent::NetworkStopped { network, tick } => {
                    info!(?network, tick, "network came to rest");
                }
                _ => {}
            }
        }
    }
}

fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data"));
    let catalog = load_catalog(&dir)?;
    info!(
        dir = %dir.display(),
        blocks = catalog.registry.block_count(),
        families = catalog.registry.family_count(),
        "loaded catalog"
    );

    let mut world = GridWorld::new();
    for block_type in &catalog.replaceable {
        world.set_replaceable(*block_type, true);
    }
    let registry = catalog.registry.clone();
    let config = catalog.config.clone();
    let mut module = MechanicalModule::new(catalog.registry, catalog.config);

    // --- Motor -> axles -> clutch -> bent gear -> down into a pulverizer ---

    place(&mut module, &mut world, GridPos::new(6, -5, 0), "pulverizer-u")?;
    place(&mut module, &mut world, GridPos::new(6, -2, 0), "axle-ud")?;
    place(&mut module, &mut world, GridPos::new(6, -1, 0), "axle-ud")?;
    place(&mut module, &mut world, GridPos::new(0, 0, 0), "motor-e")?;
    for x in 1..=3 {
        place(&mut module, &mut world, GridPos::new(x, 0, 0), "axle-ew")?;
    }
    place(&mut module, &mut world, GridPos::new(4, 0, 0), "clutch-ew")?;
    place(&mut module, &mut world, GridPos::new(5, 0, 0), "axle-ew")?;
    place(&mut module, &mut world, GridPos::new(6, 0, 0), "angled_gear-wd")?;

    // --- A second motor above a large gear hub, with an output shaft ---

    place(&mut module, &mut world, GridPos::new(0, 0, 6), "large_gear-neswud")?;
    place(&mut module, &mut world, GridPos::new(0, 1, 6), "motor-d")?;
    place(&mut module, &mut world, GridPos::new(2, 0, 6), "axle-ew")?;

    info!(
        nodes = module.node_count(),
        satellites = module.satellite_count(),
        networks = module.network_count(),
        "contraption built"
    );
    module.drain_events();

    let watch = [
        ("motor", GridPos::new(0, 0, 0)),
        ("pulverizer", GridPos::new(6, -4, 0)),
        ("hub", GridPos::new(0, 0, 6)),
        ("hub shaft", GridPos::new(2, 0, 6)),
    ];

    run(&mut module, 1, 61);
    report(&module, "after spin-up", &watch);

    // --- Disengage the clutch; the pulverizer branch coasts down ---

    module.toggle_disconnected(GridPos::new(4, 0, 0))?;
    run(&mut module, 61, 121);
    report(&module, "clutch disengaged", &watch);

    // --- Break a rim cell; the hub falls back to a plain vertical axle ---

    module.break_block(&mut world, GridPos::new(1, 0, 6))?;
    for event in module.drain_events() {
        info!(?event, "topology");
    }
    run(&mut module, 121, 141);
    report(&module, "hub detached", &watch);

    // --- Save and reload ---

    let data = module.save(140)?;
    let reloaded = MechanicalModule::load(registry, config, &data)?;
    info!(
        bytes = data.len(),
        nodes = reloaded.node_count(),
        networks = reloaded.network_count(),
        "reloaded from save"
    );
    if let Err(violations) = reloaded.validate_world(&world) {
        for violation in violations {
            tracing::warn!(%violation, "reloaded module is inconsistent");
        }
    }

    Ok(())
}
