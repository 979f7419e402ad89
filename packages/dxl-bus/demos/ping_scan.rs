use std::time::Duration;

use dxl_bus::{
    catalog::{self, mx, pro},
    protocol::{MotorId, ProtocolVersion},
    serial, BusConfig, BusError, SerialBus,
};
use log::info;

fn main() -> Result<(), BusError> {
    simplelog::TermLogger::init(
        log::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Always,
    )
    .unwrap();

    // Use the given device, or every USB serial adapter we can find
    let device_paths: Vec<String> = match std::env::args().nth(1) {
        Some(path) => vec![path],
        None => serial::available_ports()?
            .iter()
            .map(|port| port.path().to_string())
            .collect(),
    };

    for protocol in [ProtocolVersion::V2, ProtocolVersion::V1] {
        let config = BusConfig::from_baud_index(1, device_paths.clone(), protocol)?;
        let bus = SerialBus::open(&config)?;
        info!("Scanning with {protocol} at {} baud", config.baudrate);

        for id in 0..MotorId::BROADCAST.0 {
            let motor = MotorId(id);
            if !bus.ping(motor, Duration::from_millis(20))? {
                continue;
            }

            let model_number = bus.read(motor, 0, 2, Duration::from_millis(50))?.value::<u16>()?;
            let name = match catalog::layout_type_of(model_number) {
                Some(catalog::LayoutType::Pro) => pro::CATALOG.model(model_number).map(|model| model.short_name),
                Some(catalog::LayoutType::Mx) => mx::CATALOG.model(model_number).map(|model| model.short_name),
                None => None,
            };
            info!("Motor {motor}: model {model_number} ({})", name.unwrap_or("unknown"));
        }
    }

    Ok(())
}
