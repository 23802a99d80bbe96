use super::super::*;
use hotmoka_types::{
    GameteCreationRequest, GameteCreationResponse, InitializationRequest, JarStoreInitialRequest,
    JarStoreInitialResponse,
};

// Initial transactions build the genesis state: they are not paid for, and
// any failure rejects them.
impl<'a, S: Store, T: Toolchain> Engine<'a, S, T> {
    pub(in crate::engine) fn handle_jar_store_initial(
        &self,
        request: &JarStoreInitialRequest,
    ) -> Result<TransactionResponse, Rejection> {
        self.ensure_not_initialized()?;
        let dependencies = self.jars(request.dependencies.iter().copied())?;
        let loader = self.toolchain.load(&dependencies)?;
        let verified = if self.config.skips_verification {
            VerifiedJar::new(request.jar.clone())
        } else {
            self.toolchain
                .verify(&request.jar, &loader, self.config.allows_self_charged)
                .map_err(|err| Rejection::InitialFailed(err.into()))?
        };
        let model = self.store.gas_cost_model()?;
        let instrumented_jar = self
            .toolchain
            .instrument(verified, &model)
            .map_err(|err| Rejection::InitialFailed(Fault::Internal(err)))?;

        Ok(TransactionResponse::JarStoreInitial(JarStoreInitialResponse {
            instrumented_jar,
            dependencies: request.dependencies.clone(),
            verification_version: self.toolchain.verification_version(),
        }))
    }

    pub(in crate::engine) fn handle_gamete_creation(
        &self,
        reference: TransactionReference,
        request: &GameteCreationRequest,
    ) -> Result<TransactionResponse, Rejection> {
        self.ensure_not_initialized()?;
        let jars = self.jars([request.classpath])?;
        let loader = self.toolchain.load(&jars)?;
        let mut context = ExecutionContext::new(
            self.store,
            &loader,
            self.store.gas_cost_model()?,
            reference,
            self.store.now()?,
            GasMeter::unlimited(),
        );
        let (gamete, updates) =
            create_gamete(&mut context, request).map_err(Rejection::InitialFailed)?;
        debug!(%gamete, amount = %request.initial_amount, "created gamete");

        Ok(TransactionResponse::GameteCreation(GameteCreationResponse {
            updates,
            gamete,
        }))
    }

    pub(in crate::engine) fn handle_initialization(
        &self,
        request: &InitializationRequest,
    ) -> Result<TransactionResponse, Rejection> {
        self.ensure_not_initialized()?;
        self.jars([request.classpath])?;
        self.store.class_tag(&request.manifest).map_err(|err| {
            Rejection::InitialFailed(Fault::Deserialization(format!("{err:#}")))
        })?;
        Ok(TransactionResponse::Initialization)
    }
}

fn create_gamete(
    context: &mut ExecutionContext<'_>,
    request: &GameteCreationRequest,
) -> Result<(StorageReference, Vec<Update>), Fault> {
    if request.initial_amount < BigInt::from(0) {
        return Err(Fault::Deserialization(format!(
            "negative initial amount {}",
            request.initial_amount
        )));
    }
    let valid_key = commonware_utils::from_hex(&request.public_key)
        .is_some_and(|bytes| ed25519::PublicKey::decode(bytes.as_slice()).is_ok());
    if !valid_key {
        return Err(Fault::Deserialization(format!(
            "invalid public key {:?}",
            request.public_key
        )));
    }

    let object = context.new_object(&ClassType::GAMETE)?;
    let Some(gamete) = object.as_reference().copied() else {
        return Err(Fault::NotStorable(ClassType::GAMETE));
    };
    context.set_balance(&gamete, request.initial_amount.clone())?;
    context.set_field(
        &object,
        &FieldSignature::PUBLIC_KEY,
        StorageValue::String(request.public_key.clone()).into(),
    )?;
    let updates = context.extract_updates([gamete])?;
    Ok((gamete, updates.into_iter().collect()))
}
