mod config;

use std::{env, io, time::Instant};

use log::info;
use rank::{Rank, TcpFabric, run_mesh};
use tokio::{signal, task};
use wavefront::{Farm, SquareMtx, clamp_len, sequential};

use config::Mode;

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let mode = match env::args().nth(1) {
        Some(mode) => mode.parse()?,
        None => Mode::Farm,
    };
    let spec = config::load().await?;
    info!("starting in {mode} mode over a matrix of length {}", spec.len);

    let start = Instant::now();

    let mtx = match mode {
        Mode::Sequential => {
            let len = clamp_len(spec.len);
            let mtx = task::spawn_blocking(move || {
                let mut mtx = SquareMtx::new(len);
                sequential::compute(&mut mtx);
                mtx
            })
            .await
            .map_err(io::Error::other)?;

            Some(mtx)
        }
        Mode::Farm => {
            let spec = spec.farm_spec();
            let (mtx, report) = task::spawn_blocking(move || {
                let mut mtx = SquareMtx::new(spec.len);
                Farm::new(spec.farm).run(&mut mtx).map(|report| (mtx, report))
            })
            .await
            .map_err(io::Error::other)??;

            info!(
                "{} workers advanced {} diagonals, {} units dispatched, {} computed by the emitter",
                report.workers, report.advances, report.dispatched, report.assisted
            );
            Some(mtx)
        }
        Mode::Rank => {
            let fabric = TcpFabric::bind(spec.rank, spec.host.clone(), spec.base_port).await?;
            let rank = Rank::new(spec.layout(), spec.farm, fabric)?;

            tokio::select! {
                ret = rank.run() => ret?,
                _ = signal::ctrl_c() => {
                    info!("received SIGTERM");
                    return Ok(());
                }
            }
        }
        Mode::Mesh => Some(run_mesh(spec.layout(), spec.farm).await?),
    };

    match mtx {
        Some(mtx) => info!(
            "matrix of length {} ready in {:?}, top right cell {}",
            mtx.len(),
            start.elapsed(),
            mtx.get(0, mtx.len() - 1)
        ),
        None => info!("rank {} done in {:?}", spec.rank, start.elapsed()),
    }

    Ok(())
}
