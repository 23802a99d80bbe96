use super::super::*;
use hotmoka_types::JarStoreRequest;

impl<'a, S: Store, T: Toolchain> Engine<'a, S, T> {
    pub(in crate::engine) fn handle_jar_store(
        &self,
        reference: TransactionReference,
        request: &TransactionRequest,
        jar_store: &JarStoreRequest,
    ) -> Result<TransactionResponse, Rejection> {
        let prepared = self.precheck(request, &jar_store.header, Run::Commit)?;
        let dependencies = self.jars(jar_store.dependencies.iter().copied())?;
        let mut transaction =
            self.start(&prepared, reference, request, &jar_store.header, Run::Commit)?;
        let outcome = self.install(&mut transaction, jar_store, &dependencies);
        Ok(self.finish(transaction, Kind::JarStore, outcome))
    }

    fn install(
        &self,
        transaction: &mut Transaction<'_>,
        jar_store: &JarStoreRequest,
        dependencies: &[Jar],
    ) -> Result<Completion, Fault> {
        let context = &mut transaction.context;
        let model = context.gas_cost_model().clone();
        let length = jar_store.jar.len();
        context.charge_cpu(model.cpu_cost_for_installing_jar(length))?;
        context.charge_ram(model.ram_cost_for_installing_jar(length))?;

        let loader = self.toolchain.load(dependencies).map_err(Fault::Internal)?;
        let verified = if self.config.skips_verification {
            VerifiedJar::new(jar_store.jar.clone())
        } else {
            self.toolchain
                .verify(&jar_store.jar, &loader, self.config.allows_self_charged)?
        };
        let instrumented_jar = self
            .toolchain
            .instrument(verified, &model)
            .map_err(Fault::Internal)?;
        debug!(
            caller = %transaction.caller,
            length,
            instrumented = instrumented_jar.len(),
            "installed jar"
        );

        Ok(Completion::JarInstalled {
            instrumented_jar,
            dependencies: jar_store.dependencies.clone(),
            verification_version: self.toolchain.verification_version(),
        })
    }
}
