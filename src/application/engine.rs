//! Engine Controller: owns the in-memory deployment registry and the
//! Fan-out subscription registry, and processes deploy/undeploy/done/stop
//! commands. The command loop is single-consumer, so the two registries are
//! always updated at the same serialization point: subscribers are added
//! before a worker starts and removed before it is cancelled.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::dispatcher::{self, DispatcherContext};
use crate::application::fanout::{FanoutRegistry, Subscription};
use crate::application::strategy_worker::StrategyWorker;
use crate::domain::errors::ConfigError;
use crate::domain::market::candle::Candle;
use crate::domain::repositories::DeploymentRepository;
use crate::domain::strategy::StrategyRegistry;
use crate::domain::trading::{Deployment, DeploymentStatus, TradeAdvice};

pub enum EngineCommand {
    Deploy(Box<Deployment>),
    Undeploy(Uuid),
    Done(Uuid),
    Stop(Uuid, String),
}

struct RunningDeployment {
    worker_handle: JoinHandle<()>,
    dispatcher_handle: JoinHandle<()>,
    candle_sink: Sender<Candle>,
}

pub struct EngineController {
    strategies: StrategyRegistry,
    deployments: Arc<dyn DeploymentRepository>,
    fanout_registry: FanoutRegistry,
    advice_bus: Sender<TradeAdvice>,
    running: HashMap<Uuid, RunningDeployment>,
}

impl EngineController {
    pub fn new(
        strategies: StrategyRegistry,
        deployments: Arc<dyn DeploymentRepository>,
        fanout_registry: FanoutRegistry,
        advice_bus: Sender<TradeAdvice>,
    ) -> Self {
        Self {
            strategies,
            deployments,
            fanout_registry,
            advice_bus,
            running: HashMap::new(),
        }
    }

    pub async fn run(mut self, mut commands: Receiver<EngineCommand>) {
        while let Some(command) = commands.recv().await {
            match command {
                EngineCommand::Deploy(deployment) => self.on_deploy(*deployment).await,
                EngineCommand::Undeploy(did) => self.teardown(did, DeploymentStatus::Stopped).await,
                EngineCommand::Done(did) => self.teardown(did, DeploymentStatus::Finished).await,
                EngineCommand::Stop(did, reason) => {
                    warn!(deployment_id = %did, "deployment errored: {reason}");
                    self.teardown(did, DeploymentStatus::Error).await;
                }
            }
        }
    }

    async fn on_deploy(&mut self, mut deployment: Deployment) {
        let did = deployment.id;
        let resolution = deployment.algo.resolution;
        let pair_key = deployment.algo.pair.key();

        let (candle_tx, candle_rx) = mpsc::channel(100);

        {
            let mut registry = self.fanout_registry.lock().await;
            registry.entry(pair_key.clone()).or_default().push(Subscription {
                id: did,
                resolution,
                sink: candle_tx.clone(),
            });
        }

        let strategy = match self
            .strategies
            .build(&deployment.algo.strategy_name, &deployment.algo.strategy_parameters)
        {
            Ok(strategy) => strategy,
            Err(e) => {
                self.fail_deploy(deployment, &pair_key, &candle_tx, e).await;
                return;
            }
        };

        let worker = match StrategyWorker::new(did, strategy) {
            Ok(worker) => worker,
            Err(e) => {
                self.fail_deploy(deployment, &pair_key, &candle_tx, e).await;
                return;
            }
        };

        let (raw_advice_tx, raw_advice_rx) = mpsc::channel(16);

        deployment.status = DeploymentStatus::Running;
        if let Err(e) = self.deployments.save(&deployment).await {
            error!(deployment_id = %did, "failed to persist RUNNING status: {e}");
        }

        let worker_handle = tokio::spawn(worker.run(candle_rx, raw_advice_tx));

        let dispatcher_ctx = DispatcherContext {
            deployment_id: did,
            owner: deployment.owner.clone(),
            pair: deployment.algo.pair.clone(),
            amount: deployment.amount,
            num_cycles: deployment.num_cycles,
        };
        let advice_bus = self.advice_bus.clone();
        let dispatcher_handle = tokio::spawn(dispatcher::run(dispatcher_ctx, raw_advice_rx, advice_bus));

        self.running.insert(
            did,
            RunningDeployment {
                worker_handle,
                dispatcher_handle,
                candle_sink: candle_tx,
            },
        );

        info!(deployment_id = %did, "deployment running");
    }

    async fn fail_deploy(
        &mut self,
        mut deployment: Deployment,
        pair_key: &str,
        candle_sink: &Sender<Candle>,
        reason: ConfigError,
    ) {
        let did = deployment.id;
        error!(deployment_id = %did, "deploy failed: {reason}");
        {
            let mut registry = self.fanout_registry.lock().await;
            if let Some(subs) = registry.get_mut(pair_key) {
                subs.retain(|sub| !sub.sink.same_channel(candle_sink));
            }
        }
        deployment.status = DeploymentStatus::Error;
        if let Err(e) = self.deployments.save(&deployment).await {
            error!(deployment_id = %did, "failed to persist ERROR status: {e}");
        }
    }

    async fn teardown(&mut self, did: Uuid, status: DeploymentStatus) {
        let Some(running) = self.running.remove(&did) else {
            return;
        };

        // Unregister the sink before cancelling the worker, per the
        // invariant that subscribers are removed before a worker is
        // cancelled.
        {
            let mut registry = self.fanout_registry.lock().await;
            for subs in registry.values_mut() {
                subs.retain(|sub| !sub.sink.same_channel(&running.candle_sink));
            }
        }

        running.worker_handle.abort();
        running.dispatcher_handle.abort();

        if let Ok(Some(mut deployment)) = self.deployments.find(did).await {
            deployment.status = status;
            if let Err(e) = self.deployments.save(&deployment).await {
                error!(deployment_id = %did, "failed to persist teardown status: {e}");
            }
        }

        info!(deployment_id = %did, ?status, "deployment torn down");
    }
}
