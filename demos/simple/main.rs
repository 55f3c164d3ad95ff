use std::time::Duration;

use caseflow::{ChannelEvent, ChannelOptions, EngineBuilder, SpecificationModel, Vars};
use tracing_subscriber::EnvFilter;

fn main() -> caseflow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let engine = EngineBuilder::new().async_worker_thread_number(4).build()?;

    engine.launch();

    let text = include_str!("./spec.json");

    let spec_model = SpecificationModel::from_json(text)?;

    engine.deploy(&spec_model)?;

    let case = engine.create_case(&spec_model.id, Vars::new())?;
    let cid = case.id().to_string();

    let events = ChannelEvent::channel(engine.channel(), ChannelOptions::with_cid(cid.to_owned()))?;
    events.on_complete(move |cid| {
        println!("Case completed, cid: {}", cid);
    });
    events.on_error(move |e| {
        println!("Case failed: {:?}", e);
    });
    events.on_fired(move |tid, result| {
        println!("Fired {}: consumed {:?}, produced {:?}", tid, result.consumed, result.produced);
    });

    engine.start_case(&case)?;

    case.fire_with("receive", Vars::new().with("amount", 250))?;

    // orders above the limit go through the approval sub-case
    let review = engine.start_subcase(&case, "review")?;
    review.fire_with("approve", Vars::new().with("approved", true))?;

    loop {
        if case.enabled()?.iter().any(|e| e.task == "ship") {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    case.fire("ship")?;

    while !case.is_closed() {
        std::thread::sleep(Duration::from_millis(100));
    }

    let outputs: serde_json::Value = case.snapshot()?.data.into();
    println!("Outputs: {:#?}", outputs);

    engine.shutdown();
    Ok(())
}
