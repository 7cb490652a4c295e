use std::time::Duration;

use tonic_metrics::{
    logging,
    notification::{Comparison, NotificationThreshold},
    prelude::*,
};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init(logging::DEFAULT_DIRECTIVE);

    let path = std::env::temp_dir().join("tonic-demo").join("preferences.json");
    let engine = Engine::builder().preferences_path(&path).build();
    println!("Preferences at {}", path.display());

    // Warn when CPU usage crosses 80%
    let mut cpu = engine.preferences().widget(MetricFamily::Cpu);
    cpu.thresholds = vec![NotificationThreshold::new("cpu-busy", MetricFamily::Cpu, Comparison::GreaterThan, 80.0)];
    engine.preferences().update_widget(cpu)?;

    let mut events = engine.subscribe();
    let deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => {
                if let Ok(StoreEvent::StatusChanged { family, status }) = event {
                    println!("{:>9}: {:?}", family.to_string(), status);
                }
            }
        }
    }

    println!("\nAfter ten seconds:");
    for family in MetricFamily::ALL {
        if !engine.is_visible(family) {
            println!("{:>9}: hidden", family.to_string());
            continue;
        }
        match engine.reading(family).and_then(|reading| reading.primary_value()) {
            Some(value) => println!(
                "{:>9}: {:.1} (history {:?})",
                family.to_string(),
                value,
                engine.history(family).iter().map(|v| format!("{:.1}", v)).collect::<Vec<_>>()
            ),
            None => println!("{:>9}: {:?}", family.to_string(), engine.status(family)),
        }
    }

    // The popover for the disk widget was opened
    engine.popover_opened(MetricFamily::Disk).await?;
    if let Some(age) = engine.reading_age(MetricFamily::Disk) {
        println!("\nDisk reading is {:?} old", age);
    }

    engine.shutdown().await;
    Ok(())
}
