mod test_utils;

use bolt_channels::{
    CustState, CustomerBalance, DisputeVerifier, Error, MerchState, MerchantBalance,
    PaymentAmount,
};
use test_utils::{faulty_channel, new_channel, seeded_rng, with_fault, Op};

#[test]
fn engine_faults_at_any_step_are_retriable() {
    for op in Op::ALL {
        let mut rng = seeded_rng();
        let channel = faulty_channel();
        let (mut customer, mut merchant) = new_channel(&mut rng, &channel, 100, 100);

        // Establish.
        let (commitment, proof) = with_fault(&channel, op, &mut customer, &mut merchant, |c, _| {
            c.establish_generate_proof(&mut rng, &channel)
        });
        let close_token = with_fault(&channel, op, &mut customer, &mut merchant, |_, m| {
            m.issue_close_token(
                &mut rng,
                &channel,
                &commitment,
                &proof,
                CustomerBalance::new(100),
                MerchantBalance::new(100),
            )
        });
        with_fault(&channel, op, &mut customer, &mut merchant, |c, _| {
            c.verify_close_token(&channel, &close_token)
        });
        let pay_token = with_fault(&channel, op, &mut customer, &mut merchant, |_, m| {
            m.issue_pay_token(&mut rng, &channel, &commitment)
        });
        with_fault(&channel, op, &mut customer, &mut merchant, |c, _| {
            c.establish_final(&channel, &pay_token)
        });

        // Pay.
        let payment = with_fault(&channel, op, &mut customer, &mut merchant, |c, _| {
            c.pay_generate_payment_proof(&mut rng, &channel, PaymentAmount::pay_merchant(30))
        });
        let close_token = with_fault(&channel, op, &mut customer, &mut merchant, |_, m| {
            m.verify_payment_proof(&mut rng, &channel, &payment)
        });
        let revoke_token = with_fault(&channel, op, &mut customer, &mut merchant, |c, _| {
            c.pay_generate_revoke_token(&mut rng, &channel, &close_token)
        });
        let pay_token = with_fault(&channel, op, &mut customer, &mut merchant, |_, m| {
            m.verify_revoke_token(&channel, &revoke_token)
        });
        with_fault(&channel, op, &mut customer, &mut merchant, |c, _| {
            c.pay_verify_payment_token(&channel, &pay_token)
        });
        assert_eq!(customer.customer_balance(), CustomerBalance::new(70), "{:?}", op);
        assert_eq!(customer.merchant_balance(), MerchantBalance::new(130), "{:?}", op);

        // Close.
        let cust_close = with_fault(&channel, op, &mut customer, &mut merchant, |c, _| {
            c.close(&mut rng, &channel)
        });
        let (_, merch_close) = with_fault(&channel, op, &mut customer, &mut merchant, |_, m| {
            m.close(&mut rng, &channel, "merchant payout", Some(&cust_close))
        });

        let verifier = DisputeVerifier::new(channel.engine());
        let settlement = with_fault(&channel, op, &mut customer, &mut merchant, |c, _| {
            verifier.resolve(c.channel_token(), Some(&cust_close), Some(&merch_close))
        });
        assert_eq!(settlement.customer_balance, CustomerBalance::new(70));
    }
}

#[test]
fn engine_faults_during_init_leave_nothing_behind() {
    let mut rng = seeded_rng();
    let channel = faulty_channel();

    for op in [Op::BlindSigningKeypair, Op::RangeParameters] {
        channel.engine().fail_next(op);
        assert!(matches!(
            MerchState::init(&mut rng, &channel, 10, "merchant"),
            Err(Error::CryptoEngineFault(_))
        ));
    }
    let (token, _) = MerchState::init(&mut rng, &channel, 10, "merchant").unwrap();

    for op in [Op::SigningKeypair, Op::Commit] {
        channel.engine().fail_next(op);
        let error = CustState::init(&mut rng, &channel, &token, 10, 10, "customer").unwrap_err();
        assert!(error.is_retriable());
    }
    assert!(CustState::init(&mut rng, &channel, &token, 10, 10, "customer").is_ok());
}
